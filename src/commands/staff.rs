use clap::{Args, Subcommand};

use troupe_core::Staff;

use super::{join_or_dash, notice, print_json, warn_if_offline, OutputFormat};
use crate::context::AppContext;

#[derive(Args)]
pub struct StaffCommand {
    #[command(subcommand)]
    pub command: StaffSubcommand,
}

#[derive(Subcommand)]
pub enum StaffSubcommand {
    /// List staff members
    List {
        /// Filter by role (e.g. gm)
        #[arg(long)]
        role: Option<String>,

        /// Filter by store id
        #[arg(long)]
        store: Option<String>,

        /// Include inactive and on-leave members
        #[arg(long)]
        all: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add a staff member
    Add {
        /// Name
        name: String,

        /// Role (can be repeated)
        #[arg(long = "role", value_name = "ROLE")]
        roles: Vec<String>,

        /// Store id (can be repeated)
        #[arg(long = "store", value_name = "STORE")]
        stores: Vec<String>,

        /// Contact email
        #[arg(long)]
        email: Option<String>,
    },

    /// Replace the scenarios a staff member can run
    Scenarios {
        /// Staff name
        name: String,

        /// Scenario titles; none clears the list
        titles: Vec<String>,
    },
}

impl StaffCommand {
    pub async fn run(&self, ctx: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            StaffSubcommand::List {
                role,
                store,
                all,
                format,
            } => {
                let staff = ctx.store::<Staff>();
                staff.refetch().await;
                warn_if_offline(ctx);

                let mut members = match role {
                    Some(role) => staff.by_role(role),
                    None => staff.list(),
                };
                if let Some(store) = store {
                    members.retain(|m| m.stores.iter().any(|s| s == store));
                }
                if !*all {
                    members.retain(|m| m.status == troupe_core::StaffStatus::Active);
                }

                match format {
                    OutputFormat::Json => print_json(&members)?,
                    OutputFormat::Text => {
                        if members.is_empty() {
                            println!("No staff found.");
                        }
                        for m in &members {
                            println!(
                                "{} [{}] roles: {}, scenarios: {}",
                                m.name,
                                m.status.as_str(),
                                join_or_dash(&m.role),
                                m.available_scenarios.len()
                            );
                        }
                    }
                }
                Ok(())
            }
            StaffSubcommand::Add {
                name,
                roles,
                stores,
                email,
            } => {
                let mut member = Staff::new(name.trim());
                member.role = roles.clone();
                member.stores = stores.clone();
                member.email = email.clone();

                let created = ctx
                    .store::<Staff>()
                    .create(&member)
                    .await
                    .map_err(notice)?;
                println!("Created staff member: {} ({})", created.name, created.id);
                Ok(())
            }
            StaffSubcommand::Scenarios { name, titles } => {
                let coordinator = ctx.coordinator();
                coordinator.staff().refetch().await;
                let member = coordinator
                    .staff()
                    .find_by_name(name)
                    .ok_or_else(|| format!("Staff member not found: {}", name))?;

                let updated = coordinator
                    .set_available_scenarios(&member, titles.clone())
                    .await
                    .map_err(notice)?;
                println!(
                    "Scenarios for {}: {}",
                    updated.name,
                    join_or_dash(&updated.available_scenarios)
                );
                Ok(())
            }
        }
    }
}
