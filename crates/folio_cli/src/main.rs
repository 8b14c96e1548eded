//! `folio` command-line entry point.
//!
//! # Responsibility
//! - Compose config, logging, gateway, store, and session gate for one run.
//! - Print results as JSON on stdout; errors go to stderr via `anyhow`.
//!
//! # Invariants
//! - Mutating commands require a live admin session.
//! - Passwords are read from stdin and never echoed or logged.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use folio_core::session::credential::{generate_salt, hash_password};
use folio_core::{
    init_logging_from_config, parse_tag_input, FolioConfig, ImageFile, Project, ProjectFields,
    ProjectId, ProjectStore, SessionGate, SqliteKeyValueStore, UploadedImage,
};
use log::info;
use serde::Serialize;
use serde_json::json;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Manage the projects shown on the portfolio site.
#[derive(Debug, Parser)]
#[command(name = "folio", version)]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, global = true, value_name = "PATH", default_value = "folio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List projects in collection order.
    List {
        /// Only featured projects.
        #[arg(long)]
        featured: bool,
        /// Only projects carrying this exact tag.
        #[arg(long, value_name = "TAG")]
        tag: Option<String>,
    },
    /// Show one project with related projects.
    Show {
        id: String,
        /// Maximum number of related projects.
        #[arg(long, default_value_t = 3)]
        related: usize,
    },
    /// List every tag in use.
    Tags,
    /// Create a project.
    Add(ProjectArgs),
    /// Replace the fields of a project. Omitted flags keep their value.
    Update {
        id: String,
        #[command(flatten)]
        fields: ProjectArgs,
    },
    /// Delete a project and its uploaded image.
    Delete { id: String },
    /// Upload an image and print its public URL.
    Upload { file: PathBuf },
    /// Insert the built-in projects when the collection is empty.
    Seed,
    /// Open an admin session. Reads the password from stdin.
    Login,
    /// Close the admin session.
    Logout,
    /// Print a salt and hash for the `[admin]` config section.
    /// Reads the password from stdin.
    HashPassword {
        /// Reuse an existing salt instead of generating one.
        #[arg(long)]
        salt: Option<String>,
    },
}

#[derive(Debug, Args)]
struct ProjectArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Image URL.
    #[arg(long, conflicts_with = "image_file")]
    image: Option<String>,
    /// Local image to upload and use as the project image.
    #[arg(long, value_name = "PATH")]
    image_file: Option<PathBuf>,
    /// Comma-separated tags, e.g. "React, Firebase".
    #[arg(long)]
    tags: Option<String>,
    /// Empty string clears the link.
    #[arg(long)]
    live_url: Option<String>,
    /// Empty string clears the link.
    #[arg(long)]
    github_url: Option<String>,
    #[arg(long)]
    featured: Option<bool>,
}

impl ProjectArgs {
    /// Merges the flags over `fields`, then uploads `--image-file`.
    ///
    /// The merged fields are validated before the upload, so a rejected
    /// submission never leaves a stored image behind.
    fn apply(self, mut fields: ProjectFields, store: &ProjectStore) -> Result<ProjectFields> {
        let Self {
            title,
            description,
            image,
            image_file,
            tags,
            live_url,
            github_url,
            featured,
        } = self;

        if let Some(image) = image {
            fields.image = image;
        }
        if let Some(title) = title {
            fields.title = title;
        }
        if let Some(description) = description {
            fields.description = description;
        }
        if let Some(tags) = tags {
            fields.tags = parse_tag_input(&tags);
        }
        if let Some(live_url) = live_url {
            fields.live_url = non_empty(live_url);
        }
        if let Some(github_url) = github_url {
            fields.github_url = non_empty(github_url);
        }
        if let Some(featured) = featured {
            fields.featured = featured;
        }

        if let Some(path) = image_file {
            let mut pending = fields.clone();
            pending.image = path.display().to_string();
            pending.validate()?;
            fields.image = upload(store, &path)?.into_url();
        }
        Ok(fields)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FolioConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging_from_config(&config.logging)
        .map_err(anyhow::Error::msg)
        .context("starting file logging")?;

    run(&config, cli.command)
}

fn run(config: &FolioConfig, command: Command) -> Result<()> {
    match command {
        Command::List { featured, tag } => {
            let store = open_store(config)?;
            print_json(&select_projects(&store, featured, tag.as_deref()))
        }
        Command::Show { id, related } => {
            let store = open_store(config)?;
            let id = ProjectId::new(id);
            let project = store
                .get_by_id(&id)
                .with_context(|| format!("project {id} not found"))?;
            print_json(&json!({
                "project": project,
                "related": store.related(&id, related),
            }))
        }
        Command::Tags => print_json(&open_store(config)?.all_tags()),
        Command::Add(args) => {
            require_admin(config)?;
            let store = open_store(config)?;
            let fields = args.apply(ProjectFields::default(), &store)?;
            print_json(&store.create(fields)?)
        }
        Command::Update { id, fields } => {
            require_admin(config)?;
            let store = open_store(config)?;
            let id = ProjectId::new(id);
            let current = store
                .get_by_id(&id)
                .with_context(|| format!("project {id} not found"))?;
            let fields = fields.apply(current.fields(), &store)?;
            let updated = store
                .update(&id, fields)?
                .with_context(|| format!("project {id} not found"))?;
            print_json(&updated)
        }
        Command::Delete { id } => {
            require_admin(config)?;
            let id = ProjectId::new(id);
            let deleted = open_store(config)?.delete(&id)?;
            print_json(&json!({ "id": id, "deleted": deleted }))
        }
        Command::Upload { file } => {
            require_admin(config)?;
            let uploaded = upload(&open_store(config)?, &file)?;
            print_json(&upload_summary(&uploaded))
        }
        Command::Seed => {
            require_admin(config)?;
            print_json(&json!({ "inserted": open_store(config)?.seed_if_empty()? }))
        }
        Command::Login => {
            let verifier = config
                .credential_verifier()?
                .context("no admin credentials configured; see `folio hash-password`")?;
            let password = read_password()?;
            if !session_gate(config)?.login(&verifier, &password)? {
                bail!("invalid password");
            }
            print_json(&json!({ "admin": true }))
        }
        Command::Logout => {
            session_gate(config)?.logout()?;
            print_json(&json!({ "admin": false }))
        }
        Command::HashPassword { salt } => {
            let salt = salt.unwrap_or_else(generate_salt);
            let password = read_password()?;
            print_json(&json!({
                "salt": salt,
                "password_hash": hash_password(&salt, &password),
            }))
        }
    }
}

fn select_projects(store: &ProjectStore, featured: bool, tag: Option<&str>) -> Vec<Project> {
    match tag {
        Some(tag) => store
            .list_by_tag(tag)
            .into_iter()
            .filter(|project| !featured || project.featured)
            .collect(),
        None if featured => store.list_featured(),
        None => store.list_all(),
    }
}

fn open_store(config: &FolioConfig) -> Result<ProjectStore> {
    let gateway = config.open_gateway().context("opening project gateway")?;
    let store =
        ProjectStore::open(gateway, config.store_settings()).context("loading projects")?;
    // Lives as long as the store.
    store.subscribe(|| info!("event=store_changed module=cli status=ok"));
    Ok(store)
}

fn session_gate(config: &FolioConfig) -> Result<SessionGate> {
    let store = SqliteKeyValueStore::open(&config.admin.state_path)
        .with_context(|| format!("opening {}", config.admin.state_path.display()))?;
    Ok(SessionGate::new(Arc::new(store), config.session_ttl()))
}

fn require_admin(config: &FolioConfig) -> Result<()> {
    if !session_gate(config)?.is_admin_session() {
        bail!("admin session required; run `folio login` first");
    }
    Ok(())
}

fn upload(store: &ProjectStore, path: &Path) -> Result<UploadedImage> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    Ok(store.upload_image(&ImageFile::new(file_name, bytes)))
}

fn upload_summary(uploaded: &UploadedImage) -> serde_json::Value {
    match uploaded {
        UploadedImage::Stored { url, path } => json!({ "url": url, "path": path, "placeholder": false }),
        UploadedImage::Placeholder { url, reason } => {
            json!({ "url": url, "placeholder": true, "reason": format!("{reason:?}") })
        }
    }
}

fn read_password() -> Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("password cannot be empty");
    }
    Ok(password)
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{select_projects, Cli, Command, ProjectArgs};
    use clap::{CommandFactory, Parser};
    use folio_core::{
        ProjectFields, ProjectStore, ProjectValidationError, SqliteGateway, StoreSettings,
    };
    use std::sync::Arc;

    const MEDIA_URL: &str = "http://localhost/media";

    fn memory_store() -> ProjectStore {
        let gateway = SqliteGateway::open_in_memory(MEDIA_URL).unwrap();
        ProjectStore::open(Arc::new(gateway), StoreSettings::default()).unwrap()
    }

    fn add_args(args: &[&str]) -> ProjectArgs {
        let cli = Cli::parse_from(["folio", "add"].into_iter().chain(args.iter().copied()));
        let Command::Add(project) = cli.command else {
            panic!("expected add");
        };
        project
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn update_flags_parse_into_optional_fields() {
        let cli = Cli::parse_from([
            "folio",
            "update",
            "7",
            "--title",
            "New",
            "--tags",
            "a, b",
            "--featured",
            "true",
        ]);
        let Command::Update { id, fields } = cli.command else {
            panic!("expected update");
        };
        assert_eq!(id, "7");
        assert_eq!(fields.title.as_deref(), Some("New"));
        assert_eq!(fields.featured, Some(true));
        assert!(fields.description.is_none());
    }

    #[test]
    fn image_and_image_file_conflict() {
        let result = Cli::try_parse_from([
            "folio",
            "add",
            "--image",
            "http://x/a.png",
            "--image-file",
            "a.png",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn invalid_fields_are_rejected_before_the_image_is_uploaded() {
        let store = memory_store();
        let args = add_args(&["--description", "d", "--image-file", "/does/not/exist/cover.png"]);

        let err = args.apply(ProjectFields::default(), &store).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProjectValidationError>(),
            Some(&ProjectValidationError::MissingTitle)
        );
    }

    #[test]
    fn image_file_is_uploaded_once_fields_are_valid() {
        let store = memory_store();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover shot.png");
        std::fs::write(&path, b"png").unwrap();
        let path = path.to_str().unwrap().to_string();

        let args = add_args(&["--title", "Demo", "--description", "d", "--image-file", &path]);
        let fields = args.apply(ProjectFields::default(), &store).unwrap();

        assert!(fields.image.starts_with("http://localhost/media/projects/"));
        assert!(fields.image.ends_with("_cover_shot.png"));
        assert!(store.create(fields).is_ok());
    }

    #[test]
    fn list_selection_combines_tag_and_featured_filters() {
        let store = memory_store();
        let make = |title: &str, tags: &[&str], featured: bool| ProjectFields {
            title: title.to_string(),
            description: "d".to_string(),
            image: "http://x/img.png".to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            featured,
            ..ProjectFields::default()
        };
        let web = store.create(make("web", &["Rust"], true)).unwrap();
        let cli = store.create(make("cli", &["Rust"], false)).unwrap();
        let app = store.create(make("app", &["Mobile"], true)).unwrap();

        assert_eq!(select_projects(&store, false, None).len(), 3);
        assert_eq!(select_projects(&store, true, None), vec![web.clone(), app]);
        assert_eq!(
            select_projects(&store, false, Some("Rust")),
            vec![web.clone(), cli]
        );
        assert_eq!(select_projects(&store, true, Some("Rust")), vec![web]);
        assert!(select_projects(&store, false, Some("rust")).is_empty());
    }
}
