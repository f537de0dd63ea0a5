use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use mentor_session::auth::{LogNavigator, RegisterForm};
use mentor_session::cli::{Args, Command, build_config, fail, init_logging};
use mentor_session::{ActivityKind, Session, jwt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let config = build_config(&args);
    let session = match Session::open(&config, Arc::new(LogNavigator)) {
        Ok(session) => session,
        Err(e) => std::process::exit(fail("Failed to open session", e)),
    };

    if let Err(e) = run(&session, args.command).await {
        std::process::exit(fail("Command failed", e));
    }
}

async fn run(session: &Session, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = io::stdout();

    match command {
        Command::Login { username, password } => {
            session.login(&username, &password).await?;
            writeln!(out, "Logged in as {}", username)?;
        }
        Command::Register {
            username,
            password,
            full_name,
            email,
        } => {
            let form = RegisterForm {
                username: username.clone(),
                password_confirm: password.clone(),
                password,
                full_name,
                email,
                ..Default::default()
            };
            session.register(&form).await?;
            writeln!(out, "Registered and logged in as {}", username)?;
        }
        Command::Logout => {
            session.logout();
            writeln!(out, "Logged out")?;
        }
        Command::Refresh => {
            if session.refresh().await {
                writeln!(out, "Tokens refreshed")?;
            } else {
                writeln!(out, "Refresh failed, session ended")?;
            }
        }
        Command::Status => {
            let tokens = session.tokens();
            match tokens.access_token.as_deref() {
                Some(access) if !jwt::is_expired(Some(access)) => writeln!(
                    out,
                    "Access token valid for {}s",
                    jwt::seconds_until_expiry(Some(access))
                )?,
                Some(_) => writeln!(out, "Access token expired")?,
                None => writeln!(out, "No access token")?,
            }
            let refresh = if tokens.refresh_token.is_some() {
                "present"
            } else {
                "absent"
            };
            writeln!(out, "Refresh token {}", refresh)?;
        }
        Command::Whoami => match session.fetch_user().await {
            Some(user) => {
                writeln!(out, "{} (id {})", user.username, user.id)?;
                if let Some(info) = &user.info {
                    writeln!(out, "Name: {}", info.full_name)?;
                }
                if let Some(about) = &user.about {
                    writeln!(out, "About: {}", about)?;
                }
            }
            None => writeln!(out, "Not logged in")?,
        },
        Command::ResetPassword {
            username,
            new_password,
            confirm_password,
        } => {
            session
                .reset_password(&username, &new_password, &confirm_password)
                .await?;
            writeln!(out, "Password reset for {}", username)?;
        }
        Command::UpdateAbout { about } => {
            session.update_about(&about).await?;
            writeln!(out, "Profile description updated")?;
        }
        Command::Watch => watch(session).await?,
    }

    Ok(())
}

/// Keep the session alive until stdin closes or the session ends.
async fn watch(session: &Session) -> io::Result<()> {
    session.hydrate().await;

    let handle = session.watch_activity();
    let listener = handle.listener();
    let mut tokens = session.subscribe_tokens();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Watching session activity, close stdin to stop");

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(_) => {
                    listener.notify(ActivityKind::Key);
                }
                None => break,
            },
            changed = tokens.changed() => {
                if changed.is_err() || tokens.borrow_and_update().is_empty() {
                    info!("Session ended");
                    break;
                }
            }
        }
    }

    drop(handle);
    Ok(())
}
