use std::rc::Rc;

use anyhow::{anyhow, ensure, Context};
use plinth_client::{
    api::{BackendConfig, CommentId, CommentWithAuthor, Coordinates, NewComment, ProjectId},
    time_ago, ClientRegistry, Repository, SessionContext,
};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(long, env = "PLINTH_URL")]
    url: String,

    #[structopt(long, env = "PLINTH_ANON_KEY", hide_env_values = true)]
    anon_key: String,

    #[structopt(long, env = "PLINTH_PROJECT")]
    project: ProjectId,

    /// Needed for every command that writes
    #[structopt(long, env = "PLINTH_EMAIL")]
    email: Option<String>,

    #[structopt(long, env = "PLINTH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// List the root comments of the project
    List {
        #[structopt(long)]
        resolved: bool,
    },

    /// List the unresolved comments pinned on a page
    Page { url: String },

    /// Show a comment and its replies
    Thread { id: CommentId },

    /// Resolve a comment and its replies
    Resolve { id: CommentId },

    /// Reopen a comment and its replies
    Unresolve { id: CommentId },

    /// Delete a comment and its replies
    Delete { id: CommentId },

    /// Pin a new comment on an element of a page
    Comment {
        #[structopt(long)]
        page: String,

        /// Locator of the element, eg. `//*[@id="signup"]`
        #[structopt(long)]
        xpath: String,

        #[structopt(long, default_value = "0")]
        x: f64,

        #[structopt(long, default_value = "0")]
        y: f64,

        body: String,
    },

    /// Reply to a root comment
    Reply { parent: CommentId, body: String },
}

fn print_rows(rows: &[CommentWithAuthor]) {
    let now = chrono::Utc::now();
    for r in rows {
        let c = &r.comment;
        println!(
            "{}  {:>4}  {}{}  {}: {}",
            c.id,
            time_ago(c.created_at, now),
            if c.resolved { "[resolved] " } else { "" },
            c.page_url,
            r.author_name(),
            c.body,
        );
    }
}

async fn find(repo: &Repository, id: CommentId) -> anyhow::Result<CommentWithAuthor> {
    repo.find(id)
        .await?
        .ok_or_else(|| anyhow!("comment {id} does not exist"))
}

async fn set_resolved(repo: &Repository, id: CommentId, resolved: bool) -> anyhow::Result<()> {
    let c = find(repo, id).await?;
    repo.mark_resolved(&c, resolved).await?;
    ensure!(
        find(repo, id).await?.comment.resolved == resolved,
        "the store rejected the change, see the logs"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    let config = BackendConfig {
        url: opt.url,
        anon_key: opt.anon_key,
        project_id: opt.project,
    };
    let store = ClientRegistry::postgrest().get_or_connect(&config)?;
    let session = SessionContext::init(Rc::clone(&store), config.project_id).await;
    if let (Some(email), Some(password)) = (&opt.email, &opt.password) {
        session
            .sign_in(email, password)
            .await
            .with_context(|| format!("signing in as {email}"))?;
    }
    let repo = Repository::new(session);
    let project = config.project_id;

    match opt.cmd {
        Command::List { resolved } => print_rows(&repo.list_by_resolution(project, resolved).await?),
        Command::Page { url } => print_rows(&repo.list_for_page(project, &url).await?),
        Command::Thread { id } => {
            let root = find(&repo, id).await?;
            print_rows(&[root]);
            print_rows(&repo.list_thread(id).await?);
        }
        Command::Resolve { id } => set_resolved(&repo, id, true).await?,
        Command::Unresolve { id } => set_resolved(&repo, id, false).await?,
        Command::Delete { id } => {
            let c = find(&repo, id).await?;
            repo.delete_comment(&c).await?;
            ensure!(
                repo.find(id).await?.is_none(),
                "the store rejected the deletion, see the logs"
            );
        }
        Command::Comment {
            page,
            xpath,
            x,
            y,
            body,
        } => {
            let user = repo.session().require_user()?;
            let new = NewComment::root(project, user.id, body, page, xpath, Coordinates { x, y });
            let c = repo
                .create_comment(new)
                .await?
                .ok_or_else(|| anyhow!("the store rejected the comment, see the logs"))?;
            println!("{}", c.id);
        }
        Command::Reply { parent, body } => {
            let user = repo.session().require_user()?;
            let parent = find(&repo, parent).await?;
            let page_url = parent.comment.page_url.clone();
            let new = NewComment::reply(&parent.comment, user.id, body, page_url)?;
            let c = repo
                .create_comment(new)
                .await?
                .ok_or_else(|| anyhow!("the store rejected the reply, see the logs"))?;
            println!("{}", c.id);
        }
    }

    Ok(())
}
