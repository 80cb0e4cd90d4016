use std::path::PathBuf;

use blog_tui::RunOptions;

fn main() {
    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => return,
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        }
    };

    if let Err(err) = blog_tui::run(options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

/// `Ok(None)` means a flag was handled and the program should exit.
fn parse_args(args: impl Iterator<Item = String>) -> Result<Option<RunOptions>, String> {
    let mut options = RunOptions::default();
    let mut args = args.peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("blog-tui {}", blog_tui::VERSION);
                return Ok(None);
            }
            "--help" | "-h" => {
                println!(
                    "blog-tui {} - Read and edit a single-author blog from the terminal.\n\n  --version, -V        Show version and exit\n  --help,    -h        Show this help message\n  --demo               Browse a bundled sample blog (passkey: demo)\n  --config <path>      Read settings from this YAML file\n  --route <path>       Open at /, /archive, /admin or /post/<id>",
                    blog_tui::VERSION
                );
                return Ok(None);
            }
            "--demo" => options.demo = true,
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                options.config_file = Some(PathBuf::from(path));
            }
            "--route" => {
                let route = args.next().ok_or("--route needs a path")?;
                options.route = Some(route);
            }
            other => return Err(format!("unknown argument {other:?} (try --help)")),
        }
    }
    Ok(Some(options))
}
