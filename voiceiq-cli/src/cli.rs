//! Main voiceiq command line entry points
use crate::{
    handshake::{Handshake, HandshakeConfig, HandshakeEvent, Notice, NoticeLevel},
    logging::setup_tracing,
    paths::config_file,
    settings::Settings,
    setups::prod::{CliSetup, HttpIdentityProvider, TerminalNavigator},
    store::FileStore,
};
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use inquire::ui::RenderConfig;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;
use voiceiq_core::{
    handshake::HandshakeState,
    session::{current_session, guard_route, logout, RouteDecision, Session, LOGIN_ROUTE},
};

#[derive(Debug, Parser)]
#[command(name = "voiceiq")]
#[command(about = "Sign in to VoiceIQ with your MauthN identity from the command line")]
pub struct Cli {
    #[arg(long, help = "Directory holding the signed-in identity and session")]
    store_dir: Option<PathBuf>,
    #[arg(long, help = "Whether to turn off ansi terminal colors")]
    no_colors: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in by confirming a verification request in the MauthN app
    Login(LoginCommand),
    /// Show who is currently signed in
    Whoami,
    /// Forget the signed-in identity
    Logout,
    /// Show where a navigation to the given path would end up
    Route(RouteCommand),
    /// Print file paths used by the application (e.g. the path to config)
    Paths,
}

#[derive(Debug, Parser)]
pub struct LoginCommand {
    /// Email address registered with MauthN.
    /// If not provided, you'll be asked for it.
    #[arg(long, short = 'e')]
    email: Option<String>,
}

#[derive(Debug, Parser)]
pub struct RouteCommand {
    /// The path to navigate to, e.g. "/dashboard"
    path: String,
}

impl Cli {
    pub async fn run(&self, mut settings: Settings) -> Result<()> {
        let ansi = !self.no_colors;
        setup_tracing(ansi);

        if let Some(store_dir) = &self.store_dir {
            settings.store_dir = store_dir.clone();
        }

        let store = FileStore::new(&settings.store_dir);

        match &self.command {
            Commands::Login(login_command) => {
                let render_config = if ansi {
                    RenderConfig::default_colored()
                } else {
                    RenderConfig::empty()
                };

                login(&settings, store, login_command.email.as_deref(), render_config).await?;
            }
            Commands::Whoami => {
                print_session(&current_session(&store)?);
            }
            Commands::Logout => {
                let route = logout(&store)?;
                println!("Signed out. Run \"voiceiq login\" to sign in again ({route}).");
            }
            Commands::Route(route) => {
                let session = current_session(&store)?;
                match guard_route(&route.path, &session) {
                    RouteDecision::Proceed => println!("{}", route.path),
                    RouteDecision::Redirect(to) => println!("{} -> {to}", route.path),
                }
            }
            Commands::Paths => {
                println!("{}", config_file().display());
                println!("{}", store.dir().display());
            }
        }

        Ok(())
    }
}

async fn login(
    settings: &Settings,
    store: FileStore,
    email: Option<&str>,
    render_config: RenderConfig,
) -> Result<()> {
    let session = current_session(&store)?;
    if let RouteDecision::Redirect(_) = guard_route(LOGIN_ROUTE, &session) {
        println!("Already signed in as {}.", session.display_name());
        return Ok(());
    }

    let email = match email {
        Some(email) => email.to_string(),
        None => inquire::Text::new("What's your email address?")
            .with_render_config(render_config)
            .prompt()?,
    };
    tracing::info!(email, "Email entered");

    let navigator = TerminalNavigator::default();
    let (mut handshake, mut events) = Handshake::<CliSetup>::new(
        HttpIdentityProvider::new(settings.provider_endpoint.clone()),
        store.clone(),
        navigator.clone(),
        HandshakeConfig::from(settings),
    );

    // Validation and initiation failures already carry the user-facing message
    handshake.start(&email).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                handshake.cancel().await;
                print_remaining(&mut events);
                bail!("Sign-in cancelled");
            }
            event = events.recv() => match event {
                Some(HandshakeEvent::Notice(notice)) => print_notice(&notice),
                Some(HandshakeEvent::State(HandshakeState::Idle)) | None => break,
                Some(HandshakeEvent::State(state)) => {
                    tracing::debug!(%state, "Handshake progressed");
                    if state.is_terminal() {
                        tracing::info!(%state, "Handshake finished");
                    }
                    if let Some(line) = progress_line(state) {
                        println!("{line}");
                    }
                }
            }
        }
    }

    // Let the poll loop wind down so its last notice is in the channel
    handshake.cancel().await;
    print_remaining(&mut events);

    let Some(route) = navigator.take_reload() else {
        bail!("Not signed in");
    };
    tracing::debug!(route, "Re-deriving session after reload");

    let session = current_session(&store)?;
    println!("Welcome, {}!", session.display_name());
    print_session(&session);

    Ok(())
}

/// Status shown for as long as a handshake is in flight
fn progress_line(state: HandshakeState) -> Option<&'static str> {
    if !state.is_in_progress() {
        return None;
    }

    Some(match state {
        HandshakeState::Submitting => "Contacting MauthN... (press Ctrl-C to cancel)",
        _ => "Authentication in progress... (press Ctrl-C to cancel)",
    })
}

fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Info => println!("{}", notice.message),
        NoticeLevel::Error => eprintln!("{}", notice.message),
    }
}

fn print_remaining(events: &mut UnboundedReceiver<HandshakeEvent>) {
    while let Ok(event) = events.try_recv() {
        if let HandshakeEvent::Notice(notice) = event {
            print_notice(&notice);
        }
    }
}

fn print_session(session: &Session) {
    if !session.authenticated {
        println!("{} (not signed in)", session.display_name());
        return;
    }

    println!("{}", session.display_name());
    if let Some(email) = &session.email {
        println!("Email: {email}");
    }
    match &session.avatar_source {
        Some(avatar) => println!("Avatar: {avatar}"),
        None => println!("Avatar: {}", session.initials()),
    }
    if session.verified_externally {
        println!("Verified with MauthN");
    }
}
