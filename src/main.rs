use anyhow::{Context as _, Result};
use clap::Parser;
use colored::Colorize;

use medivault::cli::args::{Cli, Commands};
use medivault::cli::commands::{self, Context};
use medivault::config::ColorSetting;
use medivault::error::MedivaultError;
use medivault::logging;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {:#}", "error".red().bold(), e);
        let code = e
            .downcast_ref::<MedivaultError>()
            .map_or(1, MedivaultError::exit_code);
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        print!("{}", commands::completions(shell));
        return Ok(());
    }

    let ctx = Context::load(cli.output)?;

    match ctx.config.general.color {
        ColorSetting::Always => colored::control::set_override(true),
        ColorSetting::Never => colored::control::set_override(false),
        ColorSetting::Auto => {},
    }
    logging::init(cli.verbose, &ctx.config.general);

    let output = match cli.command {
        Commands::Queue(args) => commands::queue(&ctx, args.command)?,
        Commands::Sync(args) => commands::sync(&ctx, args.command)?,
        Commands::Login { email, password } => commands::login(&ctx, &email, &password)
            .with_context(|| format!("login failed for {email}"))?,
        Commands::Logout => commands::logout(&ctx)?,
        Commands::Whoami => commands::whoami(&ctx)?,
        Commands::Completions { .. } => String::new(),
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
