//! CLI commands

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use hepatica_core::{LoginRequest, PredictionRequest, RegisterRequest, Role};
use hepatica_http::ApiClient;
use std::io::Write;
use std::path::PathBuf;

use crate::dashboard::Dashboard;
use crate::routes::{authorize, landing_route};
use crate::view;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "HEPATICA_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and sign in
    Register(RegisterArgs),

    /// Forget the stored session
    Logout,

    /// Show the stored session
    Whoami,

    /// List the model's input features
    Features,

    /// Submit features for a prediction
    Predict {
        /// Feature as NAME=VALUE; blank values are sent as null
        #[arg(short, long = "feature", value_name = "NAME=VALUE", value_parser = parse_feature_arg)]
        features: Vec<(String, String)>,
    },

    /// List your predictions
    Predictions,

    /// Download predictions as CSV
    Export {
        #[arg(short, long, default_value = "predictions.csv")]
        output: PathBuf,
    },

    /// Frequently asked questions
    Faqs,

    /// Partner hospitals
    Hospitals,

    /// Data processing consent
    Consent {
        #[command(subcommand)]
        command: ConsentCommands,
    },

    /// Service metrics (clinicians only)
    Metrics,

    /// Role-based overview
    Dashboard,
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(long)]
    username: String,

    #[arg(long)]
    email: String,

    #[arg(long, env = "HEPATICA_PASSWORD", hide_env_values = true)]
    password: String,

    /// Defaults to --password
    #[arg(long)]
    password_confirm: Option<String>,

    #[arg(long, default_value = "")]
    first_name: String,

    #[arg(long, default_value = "")]
    last_name: String,

    #[arg(long, value_parser = parse_role, default_value = "patient")]
    role: Role,
}

#[derive(Subcommand)]
pub enum ConsentCommands {
    /// Show consent status
    Status,

    /// Give consent
    Accept,
}

fn parse_feature_arg(input: &str) -> Result<(String, String), String> {
    let (name, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{input}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing feature name in `{input}`"));
    }
    Ok((name.to_string(), value.to_string()))
}

fn parse_role(input: &str) -> Result<Role, String> {
    match input.to_ascii_lowercase().as_str() {
        "patient" => Ok(Role::Patient),
        "clinician" => Ok(Role::Clinician),
        other => Err(format!("unknown role `{other}`, expected patient or clinician")),
    }
}

impl Commands {
    /// Whether the command needs a signed-in session
    const fn requires_session(&self) -> bool {
        !matches!(
            self,
            Self::Login { .. }
                | Self::Register(_)
                | Self::Logout
                | Self::Whoami
                | Self::Features
                | Self::Faqs
                | Self::Hospitals
        )
    }

    pub async fn execute(self, client: &ApiClient, out: &mut impl Write) -> Result<()> {
        let session = client.session().snapshot();
        if self.requires_session() {
            let required = matches!(self, Self::Metrics).then_some(Role::Clinician);
            authorize(&session, required)?;
        }

        match self {
            Self::Login { username, password } => {
                let user = client
                    .sign_in(&LoginRequest { username, password })
                    .await?;
                writeln!(out, "Welcome, {}", user.display_name())?;
                writeln!(out, "{}", landing_route(&client.session().snapshot()))?;
            }
            Self::Register(args) => {
                let password_confirm = args
                    .password_confirm
                    .unwrap_or_else(|| args.password.clone());
                let user = client
                    .sign_up(&RegisterRequest {
                        username: args.username,
                        email: args.email,
                        password: args.password,
                        password_confirm,
                        first_name: args.first_name,
                        last_name: args.last_name,
                        role: args.role,
                    })
                    .await?;
                writeln!(out, "Account created for {}", user.display_name())?;
                writeln!(out, "{}", landing_route(&client.session().snapshot()))?;
            }
            Self::Logout => {
                client.sign_out();
                writeln!(out, "Signed out")?;
            }
            Self::Whoami => view::session(out, &session)?,
            Self::Features => {
                for feature in client.get_features().await? {
                    writeln!(out, "{feature}")?;
                }
            }
            Self::Predict { features } => {
                let request = PredictionRequest::from_form(features);
                let prediction = client.predict(&request).await?;
                view::prediction(out, &prediction)?;
            }
            Self::Predictions => view::predictions(out, &client.get_predictions().await?)?,
            Self::Export { output } => {
                let csv = client.export_predictions().await?;
                tokio::fs::write(&output, &csv)
                    .await
                    .with_context(|| format!("failed to write {}", output.display()))?;
                writeln!(out, "Wrote {} bytes to {}", csv.len(), output.display())?;
            }
            Self::Faqs => view::faqs(out, &client.get_faqs().await?)?,
            Self::Hospitals => view::hospitals(out, &client.get_hospitals().await?)?,
            Self::Consent { command } => {
                let status = match command {
                    ConsentCommands::Status => client.get_consent_status().await?,
                    ConsentCommands::Accept => client.accept_consent().await?,
                };
                view::consent(out, &status)?;
            }
            Self::Metrics => view::metrics(out, &client.get_metrics().await?)?,
            Self::Dashboard => {
                let role = authorize(&session, None)?.role;
                let dashboard = Dashboard::load(client, role).await?;
                view::dashboard(out, &dashboard)?;
            }
        }

        Ok(())
    }
}
