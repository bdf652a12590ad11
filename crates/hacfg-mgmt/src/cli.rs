//! The `hacfg` command line.

use crate::config::MgmtConfig;
use crate::reporter::TracingReporter;
use crate::store::FileDocumentStore;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hacfg_core::args::{parse_permission_info_list, CmdLineInputError};
use hacfg_core::commands::resource::CreateRequest;
use hacfg_core::commands::{acl, resource, stonith};
use hacfg_core::resource_args::{
    parse_bundle_create_options, parse_bundle_reset_options, parse_bundle_update_options,
    parse_create, parse_primitive, FutureParsing, LegacyParsing, ParsingStrategy,
};
use hacfg_core::{
    Document, Environment, ForceCode, ForceFlags, LiveCluster, ReportList, Reporter, SchemaVersion,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Command line of the `hacfg` binary.
#[derive(Parser)]
#[command(name = "hacfg")]
#[command(about = "HA cluster configuration manager", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML or JSON).
    #[arg(short, long, global = true, env = "HACFG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Work on this document file instead of the live cluster.
    #[arg(short = 'f', long, global = true, env = "HACFG_FILE")]
    pub file: Option<PathBuf>,

    /// Wait for the cluster to settle; without a value waits forever.
    #[arg(
        long,
        global = true,
        value_name = "SECS",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "0"
    )]
    pub wait: Option<u64>,

    /// Read ambiguous resource arguments strictly.
    #[arg(long, global = true)]
    pub future: bool,

    /// Turn forceable errors into warnings.
    #[arg(long, global = true)]
    pub force: bool,

    /// Skip peers which cannot be reached.
    #[arg(long, global = true)]
    pub skip_offline: bool,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Write an empty document at the current schema.
    Init,
    /// Print the document.
    Show,
    /// Manage resources.
    Resource {
        /// Resource command.
        #[command(subcommand)]
        cmd: ResourceCmd,
    },
    /// Manage fencing devices.
    Stonith {
        /// Fencing command.
        #[command(subcommand)]
        cmd: StonithCmd,
    },
    /// Manage access control lists.
    Acl {
        /// ACL command.
        #[command(subcommand)]
        cmd: AclCmd,
    },
}

/// Group a new resource goes into.
#[derive(Args, Debug, Clone, Default)]
pub struct GroupPlacement {
    /// Put the resource into this group, creating the group when missing.
    #[arg(long)]
    pub group: Option<String>,

    /// Put the resource before this group member.
    #[arg(long, requires = "group", conflicts_with = "after")]
    pub before: Option<String>,

    /// Put the resource after this group member.
    #[arg(long, requires = "group")]
    pub after: Option<String>,
}

impl GroupPlacement {
    fn adjacent(&self) -> Option<&str> {
        self.before.as_deref().or(self.after.as_deref())
    }
}

/// Resource commands.
#[derive(Subcommand)]
pub enum ResourceCmd {
    /// Create a primitive, optionally wrapped in a clone or bundle.
    Create {
        /// Resource id.
        id: String,
        /// Agent, `standard[:provider]:type`.
        agent: String,
        /// Instance attributes followed by `op`, `meta`, `clone`,
        /// `promotable` or `bundle` sections.
        args: Vec<String>,
        /// Target group.
        #[command(flatten)]
        placement: GroupPlacement,
        /// Create the resource disabled.
        #[arg(long)]
        disabled: bool,
        /// Do not add the agent's default operations.
        #[arg(long)]
        no_default_ops: bool,
    },
    /// Stop resources and keep them stopped.
    Disable {
        /// Resource ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Allow resources to start.
    Enable {
        /// Resource ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete resources.
    Delete {
        /// Resource ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Manage bundles.
    Bundle {
        /// Bundle command.
        #[command(subcommand)]
        cmd: BundleCmd,
    },
}

/// Bundle commands.
#[derive(Subcommand)]
pub enum BundleCmd {
    /// Create a bundle: `container <type> [opts] [network ...] [port-map ...]
    /// [storage-map ...] [meta ...]`.
    Create {
        /// Bundle id.
        id: String,
        /// Bundle sections.
        args: Vec<String>,
        /// Create the bundle disabled.
        #[arg(long)]
        disabled: bool,
    },
    /// Update a bundle: `[container ...] [network ...] [port-map add|delete
    /// ...] [storage-map add|delete ...] [meta ...]`.
    Update {
        /// Bundle id.
        id: String,
        /// Bundle sections.
        args: Vec<String>,
    },
    /// Replace the configuration of a bundle, keeping its resource.
    Reset {
        /// Bundle id.
        id: String,
        /// Bundle sections.
        args: Vec<String>,
        /// Leave the bundle disabled.
        #[arg(long)]
        disabled: bool,
    },
}

/// Fencing commands.
#[derive(Subcommand)]
pub enum StonithCmd {
    /// Create a fencing device.
    Create {
        /// Device id.
        id: String,
        /// Fencing agent type.
        agent: String,
        /// Instance attributes followed by `op` and `meta` sections.
        args: Vec<String>,
        /// Target group.
        #[command(flatten)]
        placement: GroupPlacement,
        /// Create the device disabled.
        #[arg(long)]
        disabled: bool,
    },
}

/// ACL commands.
#[derive(Subcommand)]
pub enum AclCmd {
    /// Manage roles.
    Role {
        /// Role command.
        #[command(subcommand)]
        cmd: RoleCmd,
    },
    /// Manage users.
    User {
        /// User command.
        #[command(subcommand)]
        cmd: TargetCmd,
    },
    /// Manage groups.
    Group {
        /// Group command.
        #[command(subcommand)]
        cmd: TargetCmd,
    },
    /// Manage permissions.
    Permission {
        /// Permission command.
        #[command(subcommand)]
        cmd: PermissionCmd,
    },
    /// Print roles, users and groups.
    Show,
}

/// Role commands.
#[derive(Subcommand)]
pub enum RoleCmd {
    /// Create a role: `[description=D] [<read|write|deny> <xpath|id> <query|id>]...`.
    Create {
        /// Role id.
        id: String,
        /// Description and permissions.
        args: Vec<String>,
    },
    /// Delete a role.
    Delete {
        /// Role id.
        id: String,
        /// Also delete users and groups left without roles.
        #[arg(long)]
        autodelete: bool,
    },
    /// Assign a role: `[user|group] <id>`.
    Assign {
        /// Role id.
        role: String,
        /// Optional kind followed by the user or group id.
        #[arg(num_args = 1..=2, required = true)]
        target: Vec<String>,
    },
    /// Unassign a role: `[user|group] <id>`.
    Unassign {
        /// Role id.
        role: String,
        /// Optional kind followed by the user or group id.
        #[arg(num_args = 1..=2, required = true)]
        target: Vec<String>,
        /// Delete the user or group once it has no roles.
        #[arg(long)]
        autodelete: bool,
    },
}

/// User and group commands.
#[derive(Subcommand)]
pub enum TargetCmd {
    /// Create with the given roles.
    Create {
        /// User or group id.
        id: String,
        /// Roles to assign.
        roles: Vec<String>,
    },
    /// Delete.
    Delete {
        /// User or group id.
        id: String,
    },
}

/// Permission commands.
#[derive(Subcommand)]
pub enum PermissionCmd {
    /// Add permissions to a role, creating the role when missing.
    Add {
        /// Role id.
        role: String,
        /// `<read|write|deny> <xpath|id> <query|id>` triples.
        #[arg(required = true)]
        args: Vec<String>,
    },
    /// Delete a permission.
    Delete {
        /// Permission id.
        id: String,
    },
}

/// Target of a role assignment given as `[user|group] <id>`.
enum AssignTarget<'a> {
    Any(&'a str),
    User(&'a str),
    Group(&'a str),
}

fn assign_target(target: &[String]) -> Result<AssignTarget<'_>, CmdLineInputError> {
    match target {
        [id] => Ok(AssignTarget::Any(id)),
        [kind, id] if kind == "user" => Ok(AssignTarget::User(id)),
        [kind, id] if kind == "group" => Ok(AssignTarget::Group(id)),
        _ => Err(CmdLineInputError::new("expected [user|group] <id>")),
    }
}

/// Splits an optional leading `description=` off role arguments.
fn split_description(args: &[String]) -> (Option<&str>, &[String]) {
    match args.split_first() {
        Some((first, rest)) => match first.strip_prefix("description=") {
            Some(description) => (Some(description), rest),
            None => (None, args),
        },
        None => (None, args),
    }
}

impl Cli {
    /// Runs the command, reporting failures through the tracing reporter.
    pub async fn run(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => MgmtConfig::from_file(path)
                .with_context(|| format!("cannot load configuration {}", path.display()))?,
            None => MgmtConfig::default(),
        };

        if let Command::Init = self.command {
            return self.init(&config).await;
        }

        let mut env = self.environment(&config).await?;
        if let Err(err) = self.execute(&mut env, &config).await {
            TracingReporter::new().report_failure(&err);
            return Err(err.into());
        }

        if let (Some(path), Some(document)) = (&self.file, env.offline_document()) {
            tokio::fs::write(path, document)
                .await
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
        Ok(())
    }

    fn document_path<'a>(&'a self, config: &'a MgmtConfig) -> &'a PathBuf {
        self.file.as_ref().unwrap_or(&config.document_file)
    }

    fn force_flags(&self) -> ForceFlags {
        if self.force {
            ForceFlags::new([ForceCode::Force])
        } else {
            ForceFlags::none()
        }
    }

    fn parsing_strategy(&self, config: &MgmtConfig) -> &'static dyn ParsingStrategy {
        if self.future || config.future_parsing {
            &FutureParsing
        } else {
            &LegacyParsing
        }
    }

    async fn init(&self, config: &MgmtConfig) -> Result<()> {
        let path = self.document_path(config);
        if path.exists() && !self.force {
            anyhow::bail!("{} already exists, use --force to overwrite", path.display());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let document = Document::new(SchemaVersion::LATEST).to_text()?;
        tokio::fs::write(path, document)
            .await
            .with_context(|| format!("cannot write {}", path.display()))?;
        info!(path = %path.display(), "initialized document");
        Ok(())
    }

    /// Builds the environment the command runs in.
    ///
    /// The live target is the configured document file only. No status
    /// reader, idle waiter or peer transport is attached, so `--wait` and
    /// peer distribution are rejected before the document changes.
    async fn environment(&self, config: &MgmtConfig) -> Result<Environment> {
        let options = config.env_options(self.wait, self.skip_offline);
        let reporter: Arc<dyn Reporter> = Arc::new(TracingReporter::new());
        match &self.file {
            Some(path) => {
                let document = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("cannot read {}", path.display()))?;
                Ok(Environment::offline(document, options, reporter))
            }
            None => {
                let store = FileDocumentStore::new(&config.document_file);
                let cluster = LiveCluster::new(Arc::new(store));
                Ok(Environment::live(cluster, options, reporter))
            }
        }
    }

    async fn execute(&self, env: &mut Environment, config: &MgmtConfig) -> hacfg_core::Result<()> {
        match &self.command {
            Command::Init => Ok(()),
            Command::Show => {
                let document = env.get_document(None).await?;
                println!("{}", document.to_text()?);
                Ok(())
            }
            Command::Resource { cmd } => self.resource(env, config, cmd).await,
            Command::Stonith { cmd } => self.stonith(env, cmd).await,
            Command::Acl { cmd } => self.acl(env, cmd).await,
        }
    }

    async fn resource(
        &self,
        env: &mut Environment,
        config: &MgmtConfig,
        cmd: &ResourceCmd,
    ) -> hacfg_core::Result<()> {
        match cmd {
            ResourceCmd::Create {
                id,
                agent,
                args,
                placement,
                disabled,
                no_default_ops,
            } => {
                let mut warnings = ReportList::new();
                let parsed = parse_create(args, self.parsing_strategy(config), &mut warnings)?;
                env.report_processor().report_list(&warnings);
                let has_wrapper = parsed.clone.is_some()
                    || parsed.promotable.is_some()
                    || parsed.bundle_id.is_some();
                if placement.group.is_some() && has_wrapper {
                    return Err(CmdLineInputError::new(
                        "--group cannot be combined with clone, promotable or bundle",
                    )
                    .into());
                }
                let request = CreateRequest {
                    resource_id: id.clone(),
                    agent_name: agent.clone(),
                    options: parsed.primitive,
                    metadata: None,
                    use_default_operations: !no_default_ops,
                    ensure_disabled: *disabled,
                    force_flags: self.force_flags(),
                };
                if let Some(group) = placement.group.as_deref() {
                    resource::create_in_group(
                        env,
                        &request,
                        group,
                        placement.adjacent(),
                        placement.after.is_some(),
                    )
                    .await?;
                } else if let Some(clone) = &parsed.clone {
                    resource::create_as_clone(env, &request, clone).await?;
                } else if let Some(promotable) = &parsed.promotable {
                    resource::create_as_promotable(env, &request, promotable).await?;
                } else if let Some(bundle_id) = parsed.bundle_id.as_deref() {
                    resource::create_into_bundle(env, &request, bundle_id).await?;
                } else {
                    resource::create(env, &request).await?;
                }
            }
            ResourceCmd::Disable { ids } => {
                resource::disable(env, ids).await?;
            }
            ResourceCmd::Enable { ids } => {
                resource::enable(env, ids).await?;
            }
            ResourceCmd::Delete { ids } => {
                for id in ids {
                    resource::delete(env, id).await?;
                }
            }
            ResourceCmd::Bundle { cmd } => self.bundle(env, cmd).await?,
        }
        Ok(())
    }

    async fn bundle(&self, env: &mut Environment, cmd: &BundleCmd) -> hacfg_core::Result<()> {
        let force_flags = self.force_flags();
        match cmd {
            BundleCmd::Create { id, args, disabled } => {
                let options = parse_bundle_create_options(args)?;
                resource::bundle_create(env, id, &options, &force_flags, *disabled).await?;
            }
            BundleCmd::Update { id, args } => {
                let options = parse_bundle_update_options(args)?;
                resource::bundle_update(env, id, &options, &force_flags).await?;
            }
            BundleCmd::Reset { id, args, disabled } => {
                let options = parse_bundle_reset_options(args)?;
                resource::bundle_reset(env, id, &options, &force_flags, *disabled).await?;
            }
        }
        Ok(())
    }

    async fn stonith(&self, env: &mut Environment, cmd: &StonithCmd) -> hacfg_core::Result<()> {
        let StonithCmd::Create {
            id,
            agent,
            args,
            placement,
            disabled,
        } = cmd;
        let request = CreateRequest {
            resource_id: id.clone(),
            agent_name: agent.clone(),
            options: parse_primitive(args)?,
            metadata: None,
            use_default_operations: true,
            ensure_disabled: *disabled,
            force_flags: self.force_flags(),
        };
        match placement.group.as_deref() {
            Some(group) => {
                stonith::create_in_group(
                    env,
                    &request,
                    group,
                    placement.adjacent(),
                    placement.after.is_some(),
                )
                .await?;
            }
            None => {
                stonith::create(env, &request).await?;
            }
        }
        Ok(())
    }

    async fn acl(&self, env: &mut Environment, cmd: &AclCmd) -> hacfg_core::Result<()> {
        match cmd {
            AclCmd::Role { cmd } => match cmd {
                RoleCmd::Create { id, args } => {
                    let (description, permissions) = split_description(args);
                    let permissions = parse_permission_info_list(permissions)?;
                    acl::create_role(env, id, &permissions, description).await?;
                }
                RoleCmd::Delete { id, autodelete } => {
                    acl::remove_role(env, id, *autodelete).await?;
                }
                RoleCmd::Assign { role, target } => match assign_target(target)? {
                    AssignTarget::Any(id) => {
                        acl::assign_role_not_specific(env, role, id).await?;
                    }
                    AssignTarget::User(id) => {
                        acl::assign_role_to_target(env, role, id).await?;
                    }
                    AssignTarget::Group(id) => {
                        acl::assign_role_to_group(env, role, id).await?;
                    }
                },
                RoleCmd::Unassign {
                    role,
                    target,
                    autodelete,
                } => {
                    let id = match assign_target(target)? {
                        AssignTarget::Any(id) | AssignTarget::User(id) | AssignTarget::Group(id) => id,
                    };
                    acl::unassign_role_not_specific(env, role, id, *autodelete).await?;
                }
            },
            AclCmd::User { cmd } => match cmd {
                TargetCmd::Create { id, roles } => {
                    acl::create_target(env, id, roles).await?;
                }
                TargetCmd::Delete { id } => {
                    acl::remove_target(env, id).await?;
                }
            },
            AclCmd::Group { cmd } => match cmd {
                TargetCmd::Create { id, roles } => {
                    acl::create_group(env, id, roles).await?;
                }
                TargetCmd::Delete { id } => {
                    acl::remove_group(env, id).await?;
                }
            },
            AclCmd::Permission { cmd } => match cmd {
                PermissionCmd::Add { role, args } => {
                    let permissions = parse_permission_info_list(args)?;
                    acl::add_permission(env, role, &permissions).await?;
                }
                PermissionCmd::Delete { id } => {
                    acl::remove_permission(env, id).await?;
                }
            },
            AclCmd::Show => {
                let config = acl::get_config(env).await?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
        Ok(())
    }
}
