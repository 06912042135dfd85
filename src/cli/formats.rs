use crate::cli::OutputFormat;
use crate::loader::registry::FormatRegistry;

/// Execute formats subcommand
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn run(format: OutputFormat) -> anyhow::Result<()> {
    let formats = FormatRegistry::standard().list_formats();

    match format {
        OutputFormat::Text => {
            println!("{:<10} {:<6} {:<8} DESCRIPTION", "NAME", "PROBE", "ENCODING");
            for f in &formats {
                println!(
                    "{:<10} {:<6} {:<8} {}",
                    f.name,
                    if f.triable { "yes" } else { "no" },
                    if f.binary { "binary" } else { "text" },
                    f.description
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&formats)?),
        OutputFormat::Tsv => {
            println!("name\ttriable\tbinary\tdescription");
            for f in &formats {
                println!("{}\t{}\t{}\t{}", f.name, f.triable, f.binary, f.description);
            }
        }
    }

    Ok(())
}
