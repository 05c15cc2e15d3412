//! Vestibule CLI - headless client for the Vestibule identity service
//!
//! This binary drives the full credential exchange protocol from a
//! terminal:
//! - Password, social-token, one-time-code and recovery-code logins
//! - Account signup, email confirmation and password recovery
//! - MFA enrollment and recovery code management
//! - Linked third-party account management

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use vestibule_core::api::{HttpApiClient, config};
use vestibule_core::auth::{
    ActivateMfaRequest, AuthManager, EnrollmentSecretRequest, FileSessionStore, LoginKind,
    LoginOutcome, LoginType, MfaChallenge, MfaManager, Navigator, Notice, Notifier,
    PasswordCredentials, Provider, Route, SessionRegistry, SessionStore, SignupRequest,
    UpdatePasswordRequest,
};

#[derive(Parser)]
#[command(name = "vestibule")]
#[command(author = "Vestibule Team")]
#[command(version)]
#[command(about = "Headless client for the Vestibule identity service")]
#[command(long_about = "
Vestibule CLI drives the credential exchange protocol of a Vestibule
identity service from the terminal: logging in with any supported
credential kind, managing MFA enrollment and linked social accounts.

Quick start:
  1. Sign in:           vestibule login --email you@example.com --password ...
  2. Check the session: vestibule status
  3. Sign out:          vestibule logout

The session survives between invocations in the platform config directory.
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },

    /// Complete a pending login with a one-time authenticator code
    LoginMfa {
        #[arg(short, long)]
        email: String,
        /// Six-digit code from the authenticator app
        #[arg(short, long)]
        code: String,
        /// Provider of the pending login, when it was a social login
        #[arg(long)]
        provider: Option<String>,
    },

    /// Complete a pending login by consuming a recovery code
    LoginRecovery {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        code: String,
        /// Provider of the pending login, when it was a social login
        #[arg(long)]
        provider: Option<String>,
    },

    /// Sign in with a token obtained from a third-party identity SDK
    LoginSocial {
        /// One of: google, github, linkedin, facebook
        #[arg(short, long)]
        provider: String,
        /// Raw JSON payload produced by the provider SDK
        #[arg(long)]
        payload: String,
    },

    /// Create a new account (a confirmation email follows)
    Signup {
        #[arg(short, long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(short, long)]
        password: String,
    },

    /// Sign out and clear the stored session
    Logout,

    /// Show the current session
    Status,

    /// Request a password-reset email
    ForgotPassword {
        #[arg(short, long)]
        email: String,
    },

    /// Set a new password using the emailed reset link's token pair
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        uidb: String,
        #[arg(short, long)]
        password: String,
    },

    /// Confirm the account email using the emailed link's token pair
    ConfirmEmail {
        #[arg(long)]
        token: String,
        #[arg(long)]
        uidb: String,
    },

    /// Resend the account confirmation email
    ResendConfirmation {
        #[arg(short, long)]
        email: String,
    },

    /// MFA enrollment and recovery codes
    Mfa {
        #[command(subcommand)]
        command: MfaCommands,
    },

    /// Linked third-party accounts
    Social {
        #[command(subcommand)]
        command: SocialCommands,
    },

    /// Replace the account password
    UpdatePassword {
        #[arg(long)]
        existing: String,
        #[arg(long)]
        new: String,
    },

    /// Show configuration paths and settings
    Config,
}

#[derive(Subcommand)]
pub enum MfaCommands {
    /// Fetch a fresh enrollment secret as a QR image payload
    Qr {
        /// Account password (required for password accounts)
        #[arg(short, long)]
        password: Option<String>,
        /// The session was established via a social provider
        #[arg(long)]
        social: bool,
    },
    /// Verify an authenticator code against the pending secret
    Verify {
        #[arg(short, long)]
        code: String,
    },
    /// Switch MFA on after a verified enrollment
    Enable {
        #[arg(short, long)]
        code: String,
    },
    /// Invalidate and reissue recovery codes
    RecoveryCodes,
}

#[derive(Subcommand)]
pub enum SocialCommands {
    /// List linked third-party accounts
    List,
    /// Unlink a third-party account by its entity id
    Unlink {
        #[arg(long)]
        entity_id: String,
    },
}

/// Prints outcome messages the way a toast layer would show them.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("{}: {}", notice.title, notice.message);
    }
}

/// There is nowhere to navigate in a terminal; record the request only.
struct SilentNavigator;

impl Navigator for SilentNavigator {
    fn navigate(&self, route: Route) {
        tracing::debug!("navigation requested: {route:?}");
    }
}

struct App {
    manager: AuthManager<HttpApiClient>,
    mfa: MfaManager<HttpApiClient>,
}

fn build_app() -> Result<App> {
    let store: Arc<dyn SessionStore> =
        Arc::new(FileSessionStore::new().context("Failed to open session storage")?);
    let api = HttpApiClient::from_config(Arc::clone(&store))
        .context("Failed to build API client")?;
    let registry = SessionRegistry::new();
    let notifier = Arc::new(ConsoleNotifier);

    let manager = AuthManager::new(
        api.clone(),
        registry.clone(),
        Arc::clone(&store),
        notifier.clone(),
        Arc::new(SilentNavigator),
    );
    let mfa = MfaManager::new(api, registry, store, notifier);

    // Pick up a session persisted by a previous invocation
    manager
        .restore_session()
        .context("Failed to restore persisted session")?;

    Ok(App { manager, mfa })
}

fn parse_provider(name: &str) -> Result<Provider> {
    Provider::from_name(name)
        .filter(|p| *p != Provider::Signup)
        .with_context(|| format!("Unknown provider '{name}' (expected google, github, linkedin or facebook)"))
}

fn pending_login_type(provider: Option<&str>) -> Result<LoginType> {
    match provider {
        Some(name) => Ok(LoginType::social(parse_provider(name)?)),
        None => Ok(LoginType::password()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("vestibule={log_level},vestibule_core={log_level}").into()
            }),
        )
        .with_target(false)
        .init();

    let format = cli.format;
    match cli.command {
        Commands::Login { email, password } => cmd_login(format, email, password).await,
        Commands::LoginMfa {
            email,
            code,
            provider,
        } => cmd_login_mfa(format, email, code, provider.as_deref()).await,
        Commands::LoginRecovery {
            email,
            code,
            provider,
        } => cmd_login_recovery(format, email, code, provider.as_deref()).await,
        Commands::LoginSocial { provider, payload } => {
            cmd_login_social(format, &provider, &payload).await
        }
        Commands::Signup {
            email,
            first_name,
            last_name,
            password,
        } => cmd_signup(format, &email, &first_name, &last_name, &password).await,
        Commands::Logout => cmd_logout(format).await,
        Commands::Status => cmd_status(format),
        Commands::ForgotPassword { email } => cmd_forgot_password(format, &email).await,
        Commands::ResetPassword {
            token,
            uidb,
            password,
        } => cmd_reset_password(format, &token, &uidb, &password).await,
        Commands::ConfirmEmail { token, uidb } => cmd_confirm_email(format, &token, &uidb).await,
        Commands::ResendConfirmation { email } => cmd_resend_confirmation(format, &email).await,
        Commands::Mfa { command } => cmd_mfa(format, command).await,
        Commands::Social { command } => cmd_social(format, command).await,
        Commands::UpdatePassword { existing, new } => {
            cmd_update_password(format, existing, new).await
        }
        Commands::Config => cmd_config(format),
    }
}

fn print_outcome(format: OutputFormat, outcome: &LoginOutcome) {
    match outcome {
        LoginOutcome::LoggedIn(session) => match format {
            OutputFormat::Text => {
                println!(
                    "Signed in as {} via {}",
                    session
                        .user
                        .full_name
                        .as_deref()
                        .or(session.user.email.as_deref())
                        .unwrap_or("unknown user"),
                    session.login_type
                );
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "signed_in",
                        "user": session.user,
                        "login_type": session.login_type,
                    })
                );
            }
        },
        LoginOutcome::MfaRequired(challenge) => match format {
            OutputFormat::Text => {
                println!("A second factor is required.");
                println!();
                println!("Complete the login with one of:");
                println!("  vestibule login-mfa --email <email> --code <code>");
                println!("  vestibule login-recovery --email <email> --code <recovery-code>");
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "mfa_required",
                        "email": challenge.email,
                        "login_type": challenge.login_type,
                    })
                );
            }
        },
        LoginOutcome::VerificationRequired { email } => match format {
            OutputFormat::Text => {
                println!("The account email has not been confirmed yet.");
                println!("Resend the confirmation with: vestibule resend-confirmation --email <email>");
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "verification_required",
                        "email": email,
                        "show_resend_link": true,
                    })
                );
            }
        },
    }
}

async fn cmd_login(format: OutputFormat, email: String, password: String) -> Result<()> {
    let app = build_app()?;
    if app.manager.registry().is_logged_in() {
        match format {
            OutputFormat::Text => {
                println!("Already signed in. Use 'vestibule logout' to sign out first.");
            }
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "status": "already_signed_in" }));
            }
        }
        return Ok(());
    }

    let outcome = app
        .manager
        .login(&PasswordCredentials { email, password })
        .await?;
    print_outcome(format, &outcome);
    Ok(())
}

async fn cmd_login_mfa(
    format: OutputFormat,
    email: String,
    code: String,
    provider: Option<&str>,
) -> Result<()> {
    let app = build_app()?;
    let challenge = MfaChallenge {
        email: Some(email),
        login_type: pending_login_type(provider)?,
    };
    let session = app.manager.login_mfa(&challenge, &code).await?;
    print_outcome(format, &LoginOutcome::LoggedIn(session));
    Ok(())
}

async fn cmd_login_recovery(
    format: OutputFormat,
    email: String,
    code: String,
    provider: Option<&str>,
) -> Result<()> {
    let app = build_app()?;
    let challenge = MfaChallenge {
        email: Some(email),
        login_type: pending_login_type(provider)?,
    };
    let session = app.manager.login_recovery(&challenge, &code).await?;
    print_outcome(format, &LoginOutcome::LoggedIn(session));
    Ok(())
}

async fn cmd_login_social(format: OutputFormat, provider: &str, payload: &str) -> Result<()> {
    let app = build_app()?;
    let provider = parse_provider(provider)?;
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("--payload must be valid JSON")?;

    let outcome = app.manager.login_social(provider, payload).await?;
    print_outcome(format, &outcome);
    Ok(())
}

async fn cmd_signup(
    format: OutputFormat,
    email: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
) -> Result<()> {
    let app = build_app()?;
    app.manager
        .signup(&SignupRequest::with_password(
            email, first_name, last_name, password,
        ))
        .await?;

    match format {
        OutputFormat::Text => {
            println!("Account created. Check your inbox for the confirmation email, then:");
            println!("  vestibule confirm-email --token <token> --uidb <uidb>");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "status": "signed_up", "email": email }));
        }
    }
    Ok(())
}

async fn cmd_logout(format: OutputFormat) -> Result<()> {
    let app = build_app()?;
    app.manager.logout().await?;

    match format {
        OutputFormat::Text => println!("Signed out."),
        OutputFormat::Json => println!("{}", serde_json::json!({ "status": "signed_out" })),
    }
    Ok(())
}

fn cmd_status(format: OutputFormat) -> Result<()> {
    let app = build_app()?;
    let snapshot = app.manager.registry().snapshot();

    match format {
        OutputFormat::Text => {
            if snapshot.is_logged_in {
                println!("Status: Signed in");
                println!(
                    "User:   {}",
                    snapshot
                        .current_user
                        .full_name
                        .as_deref()
                        .unwrap_or("-")
                );
                println!(
                    "Email:  {}",
                    snapshot.current_user.email.as_deref().unwrap_or("-")
                );
                if let Some(login_type) = snapshot.login_type {
                    println!("Method: {login_type}");
                }
            } else {
                println!("Status: Not signed in");
                println!();
                println!("Run 'vestibule login' to authenticate.");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "session": snapshot }));
        }
    }
    Ok(())
}

async fn cmd_forgot_password(format: OutputFormat, email: &str) -> Result<()> {
    let app = build_app()?;
    app.manager.forgot_password(email).await?;

    match format {
        OutputFormat::Text => println!("Password reset email requested for {email}."),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "status": "reset_requested", "email": email })
            );
        }
    }
    Ok(())
}

async fn cmd_reset_password(format: OutputFormat, token: &str, uidb: &str, password: &str) -> Result<()> {
    let app = build_app()?;
    app.manager.reset_password(token, uidb, password).await?;

    match format {
        OutputFormat::Text => println!("Password updated. You can now sign in."),
        OutputFormat::Json => println!("{}", serde_json::json!({ "status": "password_reset" })),
    }
    Ok(())
}

async fn cmd_confirm_email(format: OutputFormat, token: &str, uidb: &str) -> Result<()> {
    let app = build_app()?;
    let session = app.manager.confirm_email(token, uidb).await?;
    print_outcome(format, &LoginOutcome::LoggedIn(session));
    Ok(())
}

async fn cmd_resend_confirmation(format: OutputFormat, email: &str) -> Result<()> {
    let app = build_app()?;
    app.manager.resend_confirmation(email).await?;

    match format {
        OutputFormat::Text => println!("Confirmation email resent to {email}."),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "status": "confirmation_resent", "email": email })
            );
        }
    }
    Ok(())
}

async fn cmd_mfa(format: OutputFormat, command: MfaCommands) -> Result<()> {
    let app = build_app()?;

    match command {
        MfaCommands::Qr { password, social } => {
            let request = EnrollmentSecretRequest {
                login_type: if social {
                    LoginKind::Social
                } else {
                    LoginKind::Normal
                },
                password,
            };
            let image = app.mfa.request_enrollment_secret(&request).await?;
            match format {
                OutputFormat::Text => {
                    println!("Scan this QR payload with your authenticator app:");
                    println!("{image}");
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "qr": image }));
                }
            }
        }
        MfaCommands::Verify { code } => {
            let codes = app.mfa.verify_enrollment_code(&code).await?;
            print_recovery_codes(format, &codes);
        }
        MfaCommands::Enable { code } => {
            app.mfa
                .activate(&ActivateMfaRequest {
                    enabled: true,
                    otp: code,
                })
                .await?;
            match format {
                OutputFormat::Text => println!("MFA is now enabled for this account."),
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "status": "mfa_enabled" }));
                }
            }
        }
        MfaCommands::RecoveryCodes => {
            let codes = app.mfa.regenerate_recovery_codes().await?;
            print_recovery_codes(format, &codes);
        }
    }
    Ok(())
}

fn print_recovery_codes(format: OutputFormat, codes: &[String]) {
    match format {
        OutputFormat::Text => {
            println!("Store these recovery codes somewhere safe; each works once:");
            println!();
            for code in codes {
                println!("  {code}");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "recovery_codes": codes }));
        }
    }
}

async fn cmd_social(format: OutputFormat, command: SocialCommands) -> Result<()> {
    let app = build_app()?;

    let accounts = match command {
        SocialCommands::List => app.mfa.refresh_linked_accounts().await?,
        SocialCommands::Unlink { entity_id } => app.mfa.unlink_account(&entity_id).await?,
    };

    match format {
        OutputFormat::Text => {
            if accounts.is_empty() {
                println!("No linked accounts.");
            } else {
                println!("Linked accounts:");
                for account in &accounts {
                    println!(
                        "  {:10} {}  {}",
                        account.provider.as_deref().unwrap_or("-"),
                        account.profile.entity_id,
                        account.profile.email.as_deref().unwrap_or("")
                    );
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "linked_accounts": accounts }));
        }
    }
    Ok(())
}

async fn cmd_update_password(format: OutputFormat, existing: String, new: String) -> Result<()> {
    let app = build_app()?;
    app.mfa
        .update_password(&UpdatePasswordRequest {
            existing_password: existing,
            new_password: new,
        })
        .await?;

    match format {
        OutputFormat::Text => println!("Password updated."),
        OutputFormat::Json => println!("{}", serde_json::json!({ "status": "password_updated" })),
    }
    Ok(())
}

fn cmd_config(format: OutputFormat) -> Result<()> {
    let api_config = config::load_api_config();
    let config_path = config::get_config_file_path_string();

    match format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:  {config_path}");
            println!(
                "API endpoint: {} (from {})",
                api_config.api_url, api_config.source
            );
            println!();
            println!("Environment variables:");
            println!("  VESTIBULE_API_URL - Override API endpoint");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", config::generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": config_path,
                    "api_url": api_config.api_url,
                    "api_source": format!("{}", api_config.source),
                })
            );
        }
    }
    Ok(())
}
