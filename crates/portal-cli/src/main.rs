//! Portal CLI - terminal shell over the portal session store.
//!
//! Signs in against the portal API, shows the dashboard of external
//! systems the user may open, and drives the password reset flow. The
//! session cookie is persisted between runs in the cache directory.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portal_core::api::ApiClient;
use portal_core::auth::{
    CredentialStore, GuardDecision, Navigation, Phase, Session, SessionData, SessionStore,
};
use portal_core::config::Config;
use portal_core::models::System;
use portal_core::utils::{format_last_access, initials, truncate_string};

// ============================================================================
// Constants
// ============================================================================

const LOG_FILE: &str = "portal.log";

/// Path used for hydration by commands that need a signed-in user
const PROTECTED_PATH: &str = "/dashboard";

const LOGIN_ROUTE: &str = "/login";

const USAGE: &str = "\
Usage: portal <command>

Commands:
  login [correo] [--remember]   Sign in (prompts for the password)
  logout                        Close the session
  status                        Show the current session
  dashboard                     List the systems and your access
  open <system>                 Print the URL of a system you can open
  reset-request <correo>        Send a password change link
  reset-confirm <token>         Set a new password from a reset link
  guard <path>                  Show where a path would route";

/// Initialize the tracing subscriber for logging.
/// Logs go to stderr and to a daily file under the cache directory.
fn init_tracing() -> Option<WorkerGuard> {
    // RUST_LOG controls the level (e.g., RUST_LOG=portal_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = dirs::cache_dir()
        .map(|dir| dir.join("portal").join("logs"))
        .filter(|dir| std::fs::create_dir_all(dir).is_ok());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Everything a command needs: config, the HTTP client sharing its cookie
/// jar with the store, the persisted session and the navigation channel.
struct Shell {
    config: Config,
    client: ApiClient,
    session: Session,
    store: SessionStore,
    navigation: Receiver<Navigation>,
}

impl Shell {
    fn open() -> Result<Self> {
        let config = Config::load()?;
        let client = ApiClient::from_config(&config)?;

        let cache_dir = config
            .cache_dir()
            .unwrap_or_else(|_| PathBuf::from("./cache"));
        let mut session = Session::new(cache_dir);
        match session.load() {
            Ok(true) => {
                if let Some(cookie) = session.cookie() {
                    client.restore_session_cookie(cookie);
                }
            }
            Ok(false) => debug!("No saved session"),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session file");
                session.clear()?;
            }
        }

        let (store, navigation) = SessionStore::new(Arc::new(client.clone()));

        Ok(Self {
            config,
            client,
            session,
            store,
            navigation,
        })
    }

    /// Print the navigation intents emitted so far.
    fn report_navigation(&mut self) {
        while let Ok(nav) = self.navigation.try_recv() {
            match nav {
                Navigation::External(url) => println!("→ abrir {}", url),
                other => println!("→ {}", other.target()),
            }
        }
    }

    /// Keep the jar's cookie on disk, or forget it when the jar has none.
    fn persist_cookie(&mut self, correo: Option<String>) -> Result<()> {
        match self.client.session_cookie() {
            Some(cookie) => {
                self.session.update(SessionData::new(cookie, correo));
                self.session.save()
            }
            None => {
                warn!("Server did not set a session cookie");
                self.session.clear()
            }
        }
    }

    /// Hydrate for `path`. A saved cookie the server refused is dropped
    /// from disk; timeouts and other failures keep it for the next run.
    async fn hydrate(&mut self, path: &str) -> Result<Phase> {
        let phase = self.store.initialize(path).await;
        let rejected = self.store.session_rejected();
        if should_forget_cookie(phase, rejected, self.session.data.is_some()) {
            info!("Saved session is no longer valid");
            self.session.clear()?;
        }
        Ok(phase)
    }

    /// Cookie-presence check for `path`, before any network call.
    fn route(&self, path: &str) -> GuardDecision {
        let decision = self
            .store
            .guard()
            .check(self.client.has_session_cookie(), path);
        debug!(path = path, decision = ?decision, "Route checked");
        decision
    }

    /// Hydrate and require a signed-in user.
    async fn require_session(&mut self) -> Result<()> {
        if let GuardDecision::Redirect(nav) = self.route(PROTECTED_PATH) {
            println!("→ {}", nav.target());
            bail!("not signed in, run `portal login`");
        }
        self.hydrate(PROTECTED_PATH).await?;
        if self.store.is_authenticated() {
            return Ok(());
        }
        self.report_navigation();
        match self.store.snapshot().error {
            Some(e) => Err(e.into()),
            None => bail!("not signed in, run `portal login`"),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn login(shell: &mut Shell, correo: Option<String>, remember: bool) -> Result<()> {
    // A live session on the login page goes straight to the dashboard
    if shell.route(LOGIN_ROUTE) != GuardDecision::Allow {
        shell.hydrate(LOGIN_ROUTE).await?;
        shell.report_navigation();
        if let Some(user) = shell.store.identity() {
            println!("Sesión activa como {} ({})", user.name, user.email);
            return Ok(());
        }
    }

    let correo = match correo.or_else(|| shell.config.last_correo.clone()) {
        Some(c) => c,
        None => prompt("Correo: ")?,
    };

    let remembered = CredentialStore::has_credentials(&correo);
    let password = if remembered {
        debug!("Using password from keychain");
        CredentialStore::get_password(&correo)?
    } else {
        rpassword::prompt_password("Contraseña: ").context("Failed to read password")?
    };

    let result = shell.store.login(&correo, &password).await;
    shell.report_navigation();
    let user = match result {
        Ok(user) => user,
        Err(e) => {
            if remembered && e.is_unauthorized() {
                // Stale keychain entry; prompt next time
                if let Err(err) = CredentialStore::delete(&correo) {
                    warn!(error = %err, "Failed to delete stale credential");
                }
            }
            return Err(e.into());
        }
    };

    shell.persist_cookie(Some(correo.clone()))?;
    if remember && !remembered {
        CredentialStore::store(&correo, &password)?;
    }
    shell.config.last_correo = Some(correo);
    if let Err(e) = shell.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Bienvenido, {} ({})", user.name, user.role.label());
    Ok(())
}

async fn logout(shell: &mut Shell) -> Result<()> {
    shell.store.logout().await;
    shell.session.clear()?;
    shell.report_navigation();
    println!("Sesión cerrada");
    Ok(())
}

async fn status(shell: &mut Shell) -> Result<()> {
    let phase = shell.hydrate(PROTECTED_PATH).await?;
    let state = shell.store.snapshot();
    match state.identity {
        Some(user) => {
            println!("Sesión activa");
            println!("  Nombre:        {}", user.name);
            println!("  Correo:        {}", user.email);
            println!("  Rol:           {}", user.role.label());
            println!("  Último acceso: {}", format_last_access(user.last_access.as_deref()));
        }
        None => {
            println!("Sin sesión ({:?})", phase);
            if let Some(e) = state.error {
                println!("  {}", e);
            }
        }
    }
    Ok(())
}

async fn dashboard(shell: &mut Shell) -> Result<()> {
    shell.require_session().await?;
    let user = shell
        .store
        .identity()
        .ok_or_else(|| anyhow!("not signed in"))?;
    let cards = shell
        .store
        .dashboard(&shell.config.systems)
        .unwrap_or_default();

    println!("[{}] {}", initials(&user.name), user.name);
    println!("    {}", user.email);
    println!("    {}", user.role.label());
    println!(
        "    Último acceso: {}",
        format_last_access(user.last_access.as_deref())
    );
    println!();
    println!("{:<14} {:<40} {}", "Sistema", "Descripción", "Estado");
    for card in cards {
        println!(
            "{:<14} {:<40} {}",
            card.title,
            truncate_string(card.description, 40),
            card.status_label()
        );
    }
    shell.report_navigation();
    Ok(())
}

async fn open_system(shell: &mut Shell, name: &str) -> Result<()> {
    let system = System::parse(name).ok_or_else(|| anyhow!("unknown system: {}", name))?;
    shell.require_session().await?;

    let opened = shell.store.open_system(system, &shell.config.systems);
    shell.report_navigation();
    if opened.is_none() {
        bail!("{} is not available for this account", system.title());
    }
    Ok(())
}

async fn reset_request(shell: &mut Shell, correo: &str) -> Result<()> {
    let message = shell.store.request_password_reset(correo).await?;
    println!(
        "{}",
        message.unwrap_or_else(|| "Revisa tu correo para continuar".to_string())
    );
    Ok(())
}

async fn reset_confirm(shell: &mut Shell, token: &str) -> Result<()> {
    let password =
        rpassword::prompt_password("Nueva contraseña: ").context("Failed to read password")?;
    let confirm =
        rpassword::prompt_password("Confirmar contraseña: ").context("Failed to read password")?;

    let message = shell
        .store
        .confirm_password_reset(token, &password, &confirm)
        .await?;
    println!(
        "{}",
        message.unwrap_or_else(|| "Contraseña actualizada".to_string())
    );
    Ok(())
}

fn guard(shell: &Shell, path: &str) {
    match shell.route(path) {
        GuardDecision::Allow => println!("{} → permitido", path),
        GuardDecision::Redirect(nav) => println!("{} → {}", path, nav.target()),
    }
}

/// The saved cookie goes only when the server refused it.
fn should_forget_cookie(phase: Phase, rejected: bool, has_saved: bool) -> bool {
    has_saved && rejected && phase == Phase::Anonymous
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read input")?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };
    let arg = args.get(1).filter(|a| !a.starts_with("--")).cloned();

    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut shell = Shell::open()?;
    info!(command = command, "Portal CLI starting");

    match command {
        "login" => {
            let remember = args.iter().any(|a| a == "--remember");
            login(&mut shell, arg, remember).await
        }
        "logout" => logout(&mut shell).await,
        "status" => status(&mut shell).await,
        "dashboard" => dashboard(&mut shell).await,
        "open" => {
            let name = arg.ok_or_else(|| anyhow!("usage: portal open <system>"))?;
            open_system(&mut shell, &name).await
        }
        "reset-request" => {
            let correo = arg.ok_or_else(|| anyhow!("usage: portal reset-request <correo>"))?;
            reset_request(&mut shell, &correo).await
        }
        "reset-confirm" => {
            let token = arg.ok_or_else(|| anyhow!("usage: portal reset-confirm <token>"))?;
            reset_confirm(&mut shell, &token).await
        }
        "guard" => {
            let path = arg.unwrap_or_else(|| "/".to_string());
            guard(&shell, &path);
            Ok(())
        }
        other => {
            eprintln!("{}", USAGE);
            bail!("unknown command: {}", other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_session_forgets_cookie() {
        assert!(should_forget_cookie(Phase::Anonymous, true, true));
    }

    #[test]
    fn test_timeout_keeps_cookie() {
        // A slow server leaves the session Anonymous without refusing it
        assert!(!should_forget_cookie(Phase::Anonymous, false, true));
    }

    #[test]
    fn test_nothing_to_forget() {
        assert!(!should_forget_cookie(Phase::Anonymous, true, false));
        assert!(!should_forget_cookie(Phase::Authenticated, false, true));
    }
}
