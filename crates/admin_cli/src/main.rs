use std::{error::Error, io::Write};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal,
    terminal::ClearType,
};
use migration::MigratorTrait;
use sea_orm::{
    ColumnTrait, Database, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use server::{auth, tokens, users};

#[derive(Parser, Debug)]
#[command(name = "zhangben_admin")]
#[command(about = "Admin utilities for the ledger (bootstrap users / API tokens)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./zhangben.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    User(User),
    Token(Token),
}

#[derive(Args, Debug)]
struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    Create(UserCreateArgs),
}

#[derive(Args, Debug)]
struct UserCreateArgs {
    #[arg(long)]
    username: String,
}

#[derive(Args, Debug)]
struct Token {
    #[command(subcommand)]
    command: TokenCommand,
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    Create(TokenCreateArgs),
    List,
    Revoke(TokenRevokeArgs),
}

#[derive(Args, Debug)]
struct TokenCreateArgs {
    #[arg(long)]
    name: String,
}

#[derive(Args, Debug)]
struct TokenRevokeArgs {
    #[arg(long)]
    id: i32,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> Result<Self, Box<dyn Error + Send + Sync>> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
    let _raw = RawModeGuard::enter()?;

    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;
    out.flush()?;

    let mut buf = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                break;
            }
            KeyCode::Backspace => {
                if buf.pop().is_some() {
                    execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
                    out.flush()?;
                }
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                out.flush()?;
                return Err("interrupted".into());
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                buf.push(ch);
                execute!(out, Print("*"))?;
                out.flush()?;
            }
            _ => {}
        }
    }

    Ok(buf)
}

fn prompt_password_twice() -> Result<String, Box<dyn Error + Send + Sync>> {
    let mut out = std::io::stderr();
    for _ in 0..3 {
        let p1 = prompt_password("Password: ")?;
        if p1.is_empty() {
            execute!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(ClearType::CurrentLine),
                Print("Password must not be empty.\r\n")
            )?;
            continue;
        }

        let p2 = prompt_password("Confirm password: ")?;
        if p1 == p2 {
            return Ok(p1);
        }

        execute!(
            out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
            Print("Passwords do not match. Try again.\r\n")
        )?;
    }

    Err("too many attempts".into())
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;

    match cli.command {
        Command::User(User {
            command: UserCommand::Create(args),
        }) => {
            if users::Entity::find()
                .filter(users::Column::Username.eq(args.username.clone()))
                .one(&db)
                .await?
                .is_some()
            {
                eprintln!("user already exists: {}", args.username);
                std::process::exit(1);
            }

            let password = prompt_password_twice()?;
            let user = users::ActiveModel {
                username: Set(args.username.clone()),
                password_hash: Set(auth::hash_password(&password)),
                created_at: Set(Utc::now()),
                ..Default::default()
            };
            users::Entity::insert(user).exec(&db).await?;

            println!("created user: {}", args.username);
        }
        Command::Token(Token {
            command: TokenCommand::Create(args),
        }) => {
            let token = tokens::ActiveModel {
                name: Set(args.name.clone()),
                token: Set(auth::generate_api_token()),
                is_active: Set(true),
                created_at: Set(Utc::now()),
                last_used_at: Set(None),
                ..Default::default()
            };
            let model = tokens::Entity::insert(token)
                .exec_with_returning(&db)
                .await?;

            // Shown once; only a masked form is recoverable afterwards.
            println!("created token {} ({}): {}", model.id, model.name, model.token);
        }
        Command::Token(Token {
            command: TokenCommand::List,
        }) => {
            for token in tokens::Entity::find().all(&db).await? {
                let state = if token.is_active { "active" } else { "disabled" };
                let last_used = token
                    .last_used_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}\t{}\t{}\tlast used: {}",
                    token.id, token.name, state, last_used
                );
            }
        }
        Command::Token(Token {
            command: TokenCommand::Revoke(args),
        }) => {
            let Some(token) = tokens::Entity::find_by_id(args.id).one(&db).await? else {
                eprintln!("token not found: {}", args.id);
                std::process::exit(1);
            };
            let name = token.name.clone();
            token.delete(&db).await?;
            println!("revoked token {} ({name})", args.id);
        }
    }

    Ok(())
}
