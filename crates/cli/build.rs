use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("folio")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Folio Contributors")
        .about("Fetch web pages and extract readable articles")
        .arg(clap::arg!(<URL> "URL to fetch"))
        .arg(
            clap::arg!(-o --output <FILE> "Output file (default: stdout)")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            clap::arg!(-f --format <FORMAT> "Output format (html, json, text, markdown)")
                .value_name("FORMAT")
                .default_value("html")
                .value_parser(["html", "json", "text", "markdown"]),
        )
        .arg(
            clap::arg!(--config <FILE> "JSON configuration file; flags override its values")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            clap::Arg::new("site-config")
                .long("site-config")
                .help("Site config directory, searched before the defaults (repeatable)")
                .value_name("DIR")
                .action(clap::ArgAction::Append)
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds"))
        .arg(clap::Arg::new("user-agent").long("user-agent").value_name("UA").help("Custom User-Agent for HTTP requests"))
        .arg(
            clap::Arg::new("content-links")
                .long("content-links")
                .value_name("MODE")
                .help("What to do with links in the article")
                .value_parser(["preserve", "footnotes", "remove"]),
        )
        .arg(clap::Arg::new("no-singlepage").long("no-singlepage").action(clap::ArgAction::SetTrue))
        .arg(clap::Arg::new("no-multipage").long("no-multipage").action(clap::ArgAction::SetTrue))
        .arg(
            clap::Arg::new("allow-private")
                .long("allow-private")
                .help("Allow private addresses and any port (disables SSRF protection)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    clap_complete::generate_to(clap_complete::shells::Bash, &mut cmd, "folio", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Zsh, &mut cmd, "folio", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::Fish, &mut cmd, "folio", &completions_dir).unwrap();
    clap_complete::generate_to(clap_complete::shells::PowerShell, &mut cmd, "folio", &completions_dir).unwrap();

    println!("cargo:warning=Shell completions generated in: {}", completions_dir.display());
}
