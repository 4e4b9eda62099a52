//! bookbar administration CLI
//!
//! Database maintenance without going through the HTTP API: applying
//! migrations, filling a development database with sample content, and
//! wiping it.

use std::collections::HashSet;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use uuid::Uuid;

use bookbar::{
    config::BookCatalogConfig,
    database::{DatabaseConfig, PgStore, Store},
    models::{Book, NewCollection, NewUser},
    service::{user::available_slug, BookCatalog, GoogleBooksCatalog},
};

const BOOK_SUBJECTS: &[&str] = &[
    "Biography & Autobiography",
    "Science & Technology",
    "Novel",
    "Thriller",
    "Animals",
    "Fiction / General",
    "Fantasy Fiction",
];

/// Books fetched per subject
const BOOKS_PER_SUBJECT: u8 = 30;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bram", "Chioma", "Dmitri", "Elena", "Farah", "Gus", "Hana", "Ivo", "Jun", "Kemi",
    "Luca", "Mira", "Noor", "Otto", "Priya", "Quinn", "Rosa", "Sami", "Tove",
];

const LAST_NAMES: &[&str] = &[
    "Abara", "Berg", "Castillo", "Dubois", "Eze", "Fischer", "Garcia", "Haddad", "Ito", "Jensen",
    "Kowalski", "Lindqvist", "Moreau", "Nakamura", "Okafor", "Petrov", "Rossi", "Silva",
];

const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
];

/// bookbar administration CLI
#[derive(Parser)]
#[command(name = "bookbar-admin", about = "bookbar administration CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Replace all content with sample users and collections
    Seed(SeedArgs),
    /// Delete every row of every table
    Nuke(NukeArgs),
}

#[derive(Args)]
struct SeedArgs {
    /// Number of sample users to create
    #[arg(long, default_value = "10")]
    users: usize,

    /// Number of collections to create
    #[arg(long, default_value = "30")]
    collections: usize,

    /// Books per collection
    #[arg(long, default_value = "13")]
    books: usize,

    /// Email of an existing user to keep; their account survives the wipe
    #[arg(long)]
    keep_email: Option<String>,

    /// Random seed, for reproducible sample data
    #[arg(long)]
    rng_seed: Option<u64>,
}

#[derive(Args)]
struct NukeArgs {
    /// Confirm the wipe
    #[arg(long)]
    yes: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    let db_config = DatabaseConfig::from_env()?;
    let database_pool = db_config
        .create_pool()
        .await
        .context("Failed to connect to the database")?;

    match cli.command {
        Commands::Migrate => {
            println!("🔄 Running database migrations...");
            sqlx::migrate!("./migrations").run(&database_pool).await?;
            println!("✅ Database migrations completed");
        }
        Commands::Seed(args) => {
            let catalog = GoogleBooksCatalog::new(BookCatalogConfig::default())?;
            seed(&PgStore::new(database_pool), &catalog, args).await?;
        }
        Commands::Nuke(args) => {
            if !args.yes {
                bail!("Refusing to delete everything without --yes");
            }
            PgStore::new(database_pool).nuke().await?;
            println!("💥 All tables emptied");
        }
    }

    Ok(())
}

async fn seed(store: &PgStore, catalog: &dyn BookCatalog, args: SeedArgs) -> anyhow::Result<()> {
    let mut rng = match args.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    println!("🧹 Removing existing content...");
    store.purge_content(args.keep_email.as_deref()).await?;

    let mut owners: Vec<Uuid> = Vec::with_capacity(args.users + 1);
    if let Some(email) = &args.keep_email {
        match store.get_user_by_email(email).await? {
            Some(user) => owners.push(user.id),
            None => println!("⚠️  No user with email {}, nothing kept", email),
        }
    }

    println!("👥 Creating {} users...", args.users);
    for n in 0..args.users {
        let first = pick(&mut rng, FIRST_NAMES);
        let last = pick(&mut rng, LAST_NAMES);
        let name = format!("{} {}", first, last);
        let slug = available_slug(store, &name, None).await?;

        let user = store
            .create_user(NewUser {
                email: Some(format!(
                    "{}.{}{}@example.com",
                    first.to_lowercase(),
                    last.to_lowercase(),
                    n
                )),
                name: Some(name),
                email_verified: None,
                image: None,
                slug: Some(slug),
            })
            .await?;
        owners.push(user.id);
    }

    if owners.is_empty() {
        bail!("No users to own collections; pass --users or --keep-email");
    }

    println!("📚 Fetching books for {} subjects...", BOOK_SUBJECTS.len());
    let mut books: Vec<Book> = Vec::new();
    let mut seen = HashSet::new();
    for subject in BOOK_SUBJECTS {
        let found = catalog
            .search(&format!("subject:{}", subject), BOOKS_PER_SUBJECT)
            .await
            .with_context(|| format!("Catalog search for {} failed", subject))?;
        books.extend(found.into_iter().filter(|book| seen.insert(book.id.clone())));
    }

    if books.is_empty() {
        bail!("The catalog returned no books");
    }

    println!("🗂  Creating {} collections...", args.collections);
    for _ in 0..args.collections {
        let owner = owners[rng.gen_range(0..owners.len())];
        let picked = books
            .choose_multiple(&mut rng, args.books.min(books.len()))
            .cloned()
            .collect();

        let collection = NewCollection {
            title: sentence(&mut rng, 4..8),
            description: sentence(&mut rng, 15..40),
            books: picked,
        };
        store.create_collection(owner, &collection).await?;
    }

    println!(
        "✅ Seeded {} users, {} books and {} collections",
        owners.len(),
        books.len(),
        args.collections
    );
    Ok(())
}

fn pick<'a>(rng: &mut StdRng, words: &[&'a str]) -> &'a str {
    words.choose(rng).copied().unwrap_or_default()
}

/// Capitalised lorem ipsum sentence with a word count drawn from `len`
fn sentence(rng: &mut StdRng, len: std::ops::Range<usize>) -> String {
    let count = rng.gen_range(len);
    let words: Vec<&str> = (0..count).map(|_| pick(rng, LOREM)).collect();
    let text = words.join(" ");

    let mut chars = text.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}
