// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::{BackendKind, Config};
use repairtrack_app::{AppContext, AppState, Theme, dates};
use repairtrack_db::Store;
use repairtrack_remote::Client;
use runtime::GatewayRuntime;
use std::env;
use std::path::PathBuf;
use tracing::info;

const DEMO_ASSETS: usize = 60;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `repairtrack --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let log_path = logging::init(&config)?;
    let backend = if options.demo {
        BackendKind::Local
    } else {
        config.backend()
    };
    info!(
        config = %options.config_path.display(),
        db = %db_path.display(),
        log = %log_path.display(),
        backend = backend.as_str(),
        "starting repairtrack"
    );

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or REPAIRTRACK_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if options.demo {
        runtime::seed_demo_data(&store, dates::today(), DEMO_ASSETS)?;
    }

    if options.logout {
        store.clear_session_user()?;
        info!("session cleared");
    }
    if let Some(user) = &options.user {
        store.put_session_user(user)?;
        info!(user = %user.trim(), "session started from the command line");
    }

    let client = match backend {
        BackendKind::Local => None,
        BackendKind::Remote => {
            let settings = config.remote_settings()?;
            let client = Client::new(
                &settings.url,
                &settings.api_key,
                &settings.table,
                settings.timeout,
            )
            .with_context(|| {
                format!(
                    "invalid [gateway] config in {}; fix url/api_key/table/timeout values",
                    options.config_path.display()
                )
            })?;
            Some(client)
        }
    };

    if options.check_only {
        if let Some(client) = &client {
            client.ping()?;
        }
        println!("ok: {} backend, database {}", backend.as_str(), db_path.display());
        return Ok(());
    }

    let dark_mode = store
        .dark_mode()?
        .unwrap_or_else(|| config.dark_mode_default());
    let mut context = AppContext::new(
        store.session_user()?,
        Theme::from_dark_mode(dark_mode),
        config.stats_year(dates::today().year()),
    );
    context.check_duplicates = config.check_duplicates();

    let mut state = AppState::default();
    let runtime = match client {
        Some(client) => GatewayRuntime::remote(&store, client),
        None => GatewayRuntime::local(&store),
    };
    let mut runtime = runtime.with_scanner(config.scanner_command());
    repairtrack_tui::run_app(&mut state, &mut context, &mut runtime)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    user: Option<String>,
    logout: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        user: None,
        logout: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--user" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--user requires a name"))?;
                let name = value.as_ref().trim();
                if name.is_empty() {
                    return Err(anyhow!("--user requires a non-blank name"));
                }
                options.user = Some(name.to_owned());
            }
            "--logout" => {
                options.logout = true;
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    if options.logout && options.user.is_some() {
        return Err(anyhow!("--user and --logout cannot be combined; pick one"));
    }

    Ok(options)
}

fn print_help() {
    println!("repairtrack");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with seeded demo data (in-memory)");
    println!("  --check                  Validate config, database, and gateway, then exit");
    println!("  --user <name>            Log in as <name> before launching");
    println!("  --logout                 Clear the saved session before launching");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/repairtrack-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_db_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                user: None,
                logout: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_values() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));

        let error = parse_cli_args(vec!["--user", "  "], default_options_path())
            .expect_err("blank user should fail");
        assert!(error.to_string().contains("non-blank"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_session_flags() -> Result<()> {
        let options = parse_cli_args(vec!["--user", " alice "], default_options_path())?;
        assert_eq!(options.user.as_deref(), Some("alice"));
        assert!(!options.logout);

        let options = parse_cli_args(vec!["--logout"], default_options_path())?;
        assert!(options.logout);

        let error = parse_cli_args(vec!["--logout", "--user", "bob"], default_options_path())
            .expect_err("conflicting session flags should fail");
        assert!(error.to_string().contains("cannot be combined"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_print_demo_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check", "--demo", "--print-path"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(options.print_db_path);
        assert!(options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        assert!(parse_cli_args(vec!["--help"], default_options_path())?.show_help);
        assert!(parse_cli_args(vec!["-h"], default_options_path())?.show_help);
        Ok(())
    }
}
