use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use azsaml::config::{default_config_path, Config, Profile, ResolvedProfile, DEFAULT_URL};
use azsaml::credentials::{LoginCredentials, PasswordStore};
use azsaml::prompt::{Prompter, TerminalPrompter};
use azsaml::saml::{Assertion, AwsRole};
use azsaml::Authenticator;
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "azsaml")]
#[command(about = "Sign in to Azure AD and obtain a SAML assertion for AWS")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Log progress (info level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log every request (debug level)
    #[arg(long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print the SAML assertion
    Login(LoginArgs),
    /// Create or update a profile interactively
    Configure {
        #[arg(short, long, default_value = "default")]
        profile: String,
    },
    /// List configured profiles
    Profiles,
    /// Show version and build commit
    Version,
}

#[derive(clap::Args, Debug)]
struct LoginArgs {
    #[arg(short, long, default_value = "default")]
    profile: String,

    /// One-time code for code-based MFA (skips the prompt)
    #[arg(long, env = "AZSAML_MFA_CODE", hide_env_values = true)]
    mfa_code: Option<String>,

    /// Role ARN to use when the assertion grants several
    #[arg(long)]
    role: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Role, principal, duration and assertion as JSON
    Json,
    /// The base64 assertion alone
    Assertion,
}

/// What `login` prints for the token exchange.
#[derive(Debug, Serialize)]
struct LoginOutput<'a> {
    profile: &'a str,
    role_arn: &'a str,
    principal_arn: &'a str,
    account_id: Option<&'a str>,
    region: &'a str,
    session_duration: u64,
    saml_assertion: &'a str,
}

fn init_tracing(cli: &Cli) {
    let default_level = if cli.debug {
        "azsaml=debug,info"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.log_json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Command::Login(args) => login(&cli.config, args).await,
        Command::Configure { profile } => configure(&cli.config, &profile),
        Command::Profiles => list_profiles(&cli.config),
        Command::Version => {
            println!(
                "azsaml {} ({})",
                env!("CARGO_PKG_VERSION"),
                env!("GIT_COMMIT_HASH")
            );
            Ok(())
        }
    }
}

async fn login(config_path: &Path, args: LoginArgs) -> Result<()> {
    let config = Config::load(config_path).with_context(|| {
        format!(
            "No usable config at {} (run `azsaml configure` first)",
            config_path.display()
        )
    })?;
    let profile = config.profile(&args.profile)?;
    let prompter = TerminalPrompter;

    let store = profile.password.as_ref().map(|backend| backend.build());
    let (password, prompted) = read_password(&profile, store.as_deref(), &prompter).await?;

    let mut creds = LoginCredentials::new(
        profile.username.clone(),
        SecretString::from(password.expose_secret().to_string()),
    );
    if let Some(code) = args.mfa_code.filter(|c| !c.trim().is_empty()) {
        creds = creds.with_mfa_code(code.trim().to_string());
    }

    let mut authenticator = Authenticator::new(profile.client_options(), Box::new(TerminalPrompter))?
        .with_options(profile.auth.clone());
    let assertion = match authenticator.authenticate(&creds).await {
        Ok(assertion) => assertion,
        Err(err) => {
            warn!(kind = ?err.kind(), steps = ?err.steps(), "sign-in failed");
            return Err(err).context(format!("Sign-in for profile {} failed", profile.name));
        }
    };

    if prompted {
        if let Some(store) = store.as_deref().filter(|s| s.supports_write()) {
            match store.set(password).await {
                Ok(()) => info!("saved password for profile {}", profile.name),
                Err(err) => warn!("could not save password: {err:#}"),
            }
        }
    }

    let saml = Assertion::decode(&assertion).context("Sign-in returned an unreadable assertion")?;
    let roles = saml.roles()?;
    let preferred = args.role.as_deref().or(profile.role_arn.as_deref());
    let role = choose_role(&roles, preferred, &prompter)?;

    let session_duration = saml
        .session_duration()?
        .map_or(profile.session_duration, |max| max.min(profile.session_duration));
    debug!(role = %role, session_duration, destination = ?saml.destination()?, "role selected");

    match args.format {
        OutputFormat::Assertion => println!("{assertion}"),
        OutputFormat::Json => {
            let output = LoginOutput {
                profile: &profile.name,
                role_arn: &role.role_arn,
                principal_arn: &role.principal_arn,
                account_id: role.account_id(),
                region: &profile.region,
                session_duration,
                saml_assertion: &assertion,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// The stored password, else one typed at the terminal (flagged so it can be
/// saved after a successful sign-in).
async fn read_password(
    profile: &ResolvedProfile,
    store: Option<&dyn PasswordStore>,
    prompter: &dyn Prompter,
) -> Result<(SecretString, bool)> {
    if let Some(store) = store {
        match store.get().await {
            Ok(Some(password)) => return Ok((password, false)),
            Ok(None) => debug!("password backend has no entry"),
            Err(err) => warn!("password backend failed: {err:#}"),
        }
    }

    let password = prompter
        .password(&format!("Password for {}", profile.username))
        .context("Failed to read password")?;
    Ok((password, true))
}

fn choose_role<'a>(
    roles: &'a [AwsRole],
    preferred: Option<&str>,
    prompter: &dyn Prompter,
) -> Result<&'a AwsRole> {
    if let [only] = roles {
        return Ok(only);
    }

    if let Some(arn) = preferred {
        return roles
            .iter()
            .find(|role| role.role_arn == arn)
            .with_context(|| format!("Role {arn} is not granted by the SAML assertion"));
    }

    let options: Vec<String> = roles
        .iter()
        .map(|role| format!("{} [{}]", role.name, role.account_id().unwrap_or("?")))
        .collect();
    let index = prompter
        .select("Select a role", &options)
        .context("Failed to read role selection")?;
    roles.get(index).context("Invalid role selection")
}

fn configure(config_path: &Path, name: &str) -> Result<()> {
    use dialoguer::{theme::ColorfulTheme, Confirm, Input};

    let mut config = Config::load_or_default(config_path)?;
    let existing = config.profiles.get(name).cloned().unwrap_or_default();
    let theme = ColorfulTheme::default();
    let term = dialoguer::console::Term::stderr();

    let text = |prompt: &str, current: &str, required: bool| -> Result<String> {
        let input = Input::<String>::with_theme(&theme)
            .with_prompt(prompt)
            .allow_empty(!required);
        let input = if current.is_empty() {
            input
        } else {
            input.default(current.to_string())
        };
        Ok(input.interact_text_on(&term)?.trim().to_string())
    };

    let url = text(
        "Sign-in URL",
        if existing.url.is_empty() { DEFAULT_URL } else { &existing.url },
        true,
    )?;
    let app_id = text("Application ID", &existing.app_id, true)?;
    let username = text("Username", &existing.username, true)?;
    let role_arn = text(
        "Preferred role ARN (optional)",
        existing.role_arn.as_deref().unwrap_or_default(),
        false,
    )?;
    let region = text(
        "AWS region",
        existing.region.as_deref().unwrap_or(&config.defaults.region),
        true,
    )?;
    let skip_verify = Confirm::with_theme(&theme)
        .with_prompt("Skip TLS certificate verification?")
        .default(existing.skip_verify)
        .interact_on(&term)?;

    let profile = Profile {
        url: if url == DEFAULT_URL { String::new() } else { url },
        app_id,
        username,
        role_arn: Some(role_arn).filter(|arn| !arn.is_empty()),
        region: Some(region).filter(|r| *r != config.defaults.region),
        skip_verify,
        ..existing
    };
    config.set_profile(name, profile);
    config.save(config_path)?;

    eprintln!("Saved profile {name} to {}", config_path.display());
    Ok(())
}

fn list_profiles(config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    if config.profiles.is_empty() {
        eprintln!("No profiles in {}", config_path.display());
        return Ok(());
    }

    for name in config.profile_names() {
        let profile = config.profile(name)?;
        println!("{name}\t{}\t{}", profile.username, profile.region);
    }
    Ok(())
}
