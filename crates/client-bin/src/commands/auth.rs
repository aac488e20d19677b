//! Authentication commands.

use std::io::{self, Write};

use anyhow::Result;

use auth_engine::{AuthError, RegisterRequest, Role, SessionState};

use crate::output::{self, OutputFormat};

fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

/// Login with email and password.
pub async fn login(format: &OutputFormat) -> Result<()> {
    let manager = super::build_session_manager()?;

    // Settle the stored session first; a still-valid one needs no
    // password prompt.
    if let Ok(state) = manager.check_auth_status().await {
        if state.is_authenticated() {
            let who = manager
                .snapshot()
                .user
                .and_then(|u| u.email)
                .unwrap_or_else(|| "user".to_string());
            output::print_success(&format!("Already logged in as {}", who), format);
            return Ok(());
        }
    }

    let email = prompt_line("Email")?;
    if email.is_empty() {
        output::print_error("Email is required", format);
        return Ok(());
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    println!("Logging in...");

    match manager.login(&email, &password).await {
        Ok(user) => {
            let who = user.email.unwrap_or(user.id);
            output::print_success(&format!("Logged in as {}", who), format);
        }
        Err(e) => {
            output::print_error(&e.user_message(), format);
        }
    }

    Ok(())
}

/// Register a new account.
pub async fn register(role: Role, format: &OutputFormat) -> Result<()> {
    let manager = super::build_session_manager()?;

    let name = prompt_line("Full name")?;
    let email = prompt_line("Email")?;
    if name.is_empty() || email.is_empty() {
        output::print_error("Name and email are required", format);
        return Ok(());
    }

    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }
    if password != confirm {
        output::print_error("Passwords do not match", format);
        return Ok(());
    }

    let payload = match role {
        Role::Patient => RegisterRequest::patient(email, password, name, None),
        Role::Doctor => RegisterRequest::doctor(email, password, name, None),
    };

    println!("Creating account...");

    match manager.register(payload).await {
        Ok(user) => {
            let who = user.email.unwrap_or(user.id);
            output::print_success(&format!("Account created, logged in as {}", who), format);
        }
        Err(e) => {
            output::print_error(&e.user_message(), format);
        }
    }

    Ok(())
}

/// Logout and clear the stored session.
pub async fn logout(format: &OutputFormat) -> Result<()> {
    let manager = super::build_session_manager()?;
    manager.logout().await?;
    output::print_success("Logged out", format);
    Ok(())
}

/// Check authentication status.
pub async fn status(format: &OutputFormat) -> Result<()> {
    let manager = super::build_session_manager()?;

    let state = match manager.check_auth_status().await {
        Ok(state) => state,
        Err(e) => {
            output::print_error(&e.user_message(), format);
            return Ok(());
        }
    };

    let snap = manager.snapshot();
    match format {
        OutputFormat::Text => {
            let auth = match state {
                SessionState::LoggedIn => "logged in",
                SessionState::Stale => "logged in (unverified, backend unreachable)",
                _ => "not logged in",
            };
            output::print_row("Auth", auth);
            if let Some(user) = &snap.user {
                output::print_row("User ID", &user.id);
                if let Some(email) = &user.email {
                    output::print_row("Email", email);
                }
                output::print_row("Role", &format!("{:?}", user.role));
            }
        }
        OutputFormat::Json => output::print_json(&snap)?,
    }

    Ok(())
}

/// Print the stored access token, for use with other tools.
pub async fn token(format: &OutputFormat) -> Result<()> {
    let manager = super::build_session_manager()?;

    match manager.access_token() {
        Ok(Some(token)) => match format {
            OutputFormat::Text => println!("{}", token),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "token": token }));
            }
        },
        Ok(None) => {
            output::print_error(&AuthError::NotLoggedIn.user_message(), format);
        }
        Err(e) => {
            output::print_error(&e.user_message(), format);
        }
    }

    Ok(())
}
