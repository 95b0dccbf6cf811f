use clap::{Parser, Subcommand};
use docweld::pipeline::{self, Site};
use docweld::{config, logging, output};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "docweld")]
#[command(about = "Static documentation generator: welds markdown into HTML themes")]
#[command(long_about = "\
Static documentation generator: welds markdown into HTML themes

Your filesystem is the data source. Every directory under the source root
becomes one page: a directory holding a markdown file is an article, any
other directory lists its children.

Site structure:

  site/
  ├── config.toml                  # Site config (optional)
  ├── pages/                       # Source tree
  │   ├── metadata.json            # Directory metadata (optional)
  │   └── articles/
  │       └── streams/
  │           ├── streams.md       # Article body
  │           └── streams.json     # Article metadata (or metadata.json)
  ├── authors/
  │   └── marak.json               # {\"name\": ..., \"github\": ...}
  └── theme/                       # article.html + directory.html (optional)

Output: <output>/<page path>/index.html for every page.

Run 'docweld gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Site root holding config.toml
    #[arg(long, default_value = ".", global = true)]
    site: PathBuf,

    /// Source directory, relative to the site root (overrides config.toml)
    #[arg(long, global = true)]
    source: Option<String>,

    /// Output directory, relative to the site root (overrides config.toml)
    #[arg(long, global = true)]
    output: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every page and write the site
    Build,
    /// Render every page without writing anything
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_tracing();

    let write = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Build => true,
        Command::Check => false,
    };

    let site = resolve_site(&cli)?;
    init_thread_pool(&site.config.processing);

    if write {
        println!("==> Building {} → {}", site.source.display(), site.output.display());
    } else {
        println!("==> Checking {}", site.source.display());
    }
    let report = pipeline::build(&site, write)?;
    output::print_build_output(&report, &site.source, &site.output);

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Load `config.toml` from the site root and apply command-line overrides.
fn resolve_site(cli: &Cli) -> Result<Site, config::ConfigError> {
    let mut site_config = config::load_config(&cli.site)?;
    if let Some(source) = &cli.source {
        site_config.source = source.clone();
    }
    if let Some(output) = &cli.output {
        site_config.output = output.clone();
    }
    site_config.validate()?;
    Ok(Site::from_config(&cli.site, site_config))
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
