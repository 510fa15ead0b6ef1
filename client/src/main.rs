use std::sync::Arc;
use storefront_client::config::Config;
use storefront_client::search::{SearchCoordinator, SearchView, TokioScheduler};
use storefront_client::session::{Session, SessionManager, SessionStatus};
use storefront_client::{AuthError, HttpStorefrontApi, Product};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Type to search. Commands:
  :focus                              re-show previous results
  :dismiss                            hide results
  :select <n>                         pick the n-th result (1-based)
  :login <email> <password>
  :register <email> <password> <name...>
  :logout
  :ack                                acknowledge a failed login
  :quit";

fn print_session(session: &Session) {
    match session.status {
        SessionStatus::Anonymous => println!("[session] signed out"),
        SessionStatus::Authenticating => println!("[session] please wait..."),
        SessionStatus::Authenticated => {
            if let Some(ref user) = session.user {
                println!("[session] signed in as {} <{}>", user.name, user.email);
            }
        }
        SessionStatus::AuthFailed => println!(
            "[session] failed: {}",
            session.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn print_search(view: &SearchView) {
    if view.searching {
        println!("[search] searching {:?}...", view.settled_text);
    } else if view.visible {
        if view.results.is_empty() {
            println!("[search] no matches for {:?}", view.settled_text);
        }
        for (i, product) in view.results.iter().enumerate() {
            println!(
                "  {}. {} - {} ({})",
                i + 1,
                product.brand,
                product.title,
                product.price
            );
        }
    }
}

/// The `n`-th (1-based) result of the dropdown, only while it is shown
fn shown_result<'a>(view: &'a SearchView, n: Option<&str>) -> Option<&'a Product> {
    if !view.visible {
        return None;
    }
    let index = n?.parse::<usize>().ok()?.checked_sub(1)?;
    view.results.get(index)
}

fn report(result: Result<Session, AuthError>) {
    if let Err(e) = result {
        println!("[session] {}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront=info,storefront_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        "Loaded configuration: api={}, debounce={:?}",
        config.api.base_url, config.search.debounce
    );

    let api = Arc::new(HttpStorefrontApi::new(&config.api)?);
    let sessions = SessionManager::new(api.clone());
    let search = SearchCoordinator::new(
        api,
        Arc::new(TokioScheduler::current()),
        config.search.clone(),
    );

    sessions.subscribe(print_session);
    search.subscribe(print_search);

    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        match words.next() {
            Some(":quit") => break,
            Some(":help") => println!("{}", HELP),
            Some(":focus") => search.focus(),
            Some(":dismiss") => search.dismiss(),
            Some(":select") => {
                match shown_result(&search.view(), words.next()) {
                    Some(product) => {
                        if let Some(product) = search.select_result(&product.id) {
                            println!("[nav] product {} ({})", product.id, product.title);
                        }
                    }
                    None => println!("[search] no such result"),
                }
            }
            Some(":login") => {
                let email = words.next().unwrap_or_default();
                let password = words.next().unwrap_or_default();
                report(sessions.login(email, password).await);
            }
            Some(":register") => {
                let email = words.next().unwrap_or_default();
                let password = words.next().unwrap_or_default();
                let name = words.collect::<Vec<_>>().join(" ");
                report(sessions.register(email, password, &name).await);
            }
            Some(":logout") => {
                sessions.logout().await;
            }
            Some(":ack") => {
                sessions.acknowledge_failure();
            }
            _ => search.set_query(line.trim()),
        }
    }

    Ok(())
}
