use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::{ArgGroup, Parser};
use tracing::debug;

use rtpl::{bind, DataSource, Options, Template};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("source")
        .required(true)
        .args(["data", "data_file", "env_prefix"])
))]
struct Args {
    /// Template file to render
    #[arg(short, long)]
    template: PathBuf,

    /// Inline JSON data
    #[arg(short, long)]
    data: Option<String>,

    /// JSON or YAML data file (format picked by extension); pass `-` to
    /// read JSON from stdin
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Bind environment variables carrying this prefix; the prefix is
    /// stripped from the variable names
    #[arg(long)]
    env_prefix: Option<String>,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Strip the newline directly after each {% %} block tag
    #[arg(long)]
    trim_blocks: bool,

    /// Maximum block nesting depth accepted in the template
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Total loop iteration budget for one render
    #[arg(long, default_value_t = 1_000_000)]
    max_iterations: usize,
}

impl Args {
    fn data_source(&self) -> DataSource {
        if let Some(json) = &self.data {
            DataSource::Inline(json.clone())
        } else if let Some(path) = &self.data_file {
            if path.as_os_str() == "-" {
                DataSource::Stdin
            } else {
                DataSource::File(path.clone())
            }
        } else if let Some(prefix) = &self.env_prefix {
            DataSource::EnvPrefix(prefix.clone())
        } else {
            // The clap group requires exactly one of the three.
            unreachable!("no data source despite required arg group")
        }
    }

    fn options(&self) -> Options {
        Options {
            trim_blocks: self.trim_blocks,
            max_depth: self.max_depth,
            max_iterations: self.max_iterations,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    process::exit(run(&args));
}

fn run(args: &Args) -> i32 {
    let source = match fs::read_to_string(&args.template) {
        Ok(source) => source,
        Err(e) => {
            eprintln!(
                "error: cannot read template file {}: {}",
                args.template.display(),
                e
            );
            return 1;
        }
    };

    let rendered = match render_pipeline(&source, args) {
        Ok(rendered) => rendered,
        Err(err) => {
            eprintln!("error: {}", err);
            return err.exit_code();
        }
    };

    // Nothing is written until the render fully succeeded.
    let written = match &args.output {
        Some(path) => fs::write(path, &rendered),
        None => io::stdout().write_all(rendered.as_bytes()),
    };
    if let Err(e) = written {
        eprintln!("error: cannot write output: {}", e);
        return 1;
    }
    0
}

fn render_pipeline(source: &str, args: &Args) -> rtpl::Result<String> {
    let options = args.options();

    let template = Template::parse_with(source, &options)?;
    debug!(template = %args.template.display(), "template parsed");

    let data = bind(&args.data_source())?;
    debug!("data bound");

    template.render_with(&data, &options)
}
