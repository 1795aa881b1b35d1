//! folio command-line entry point.
//!
//! Opens an article headlessly, waits until it is ready and revealed,
//! then optionally follows links to further articles.
//!
//! ```text
//! folio <article-address> [--config <file>] [--follow <title>]... [--save]
//! ```

mod headless;

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};

use folio_article::fetcher::NetworkClient;
use folio_article::fetcher::http::HttpClient;
use folio_article::{
    ArticleDeps, CachedContentFetcher, LogAlertSink, MemoryMetadataStore, NavigationStack,
    ProcessPool, ThreadedImageFetcher, ViewState,
};
use folio_types::config::ArticleConfig;

use headless::{HeadlessViewFactory, Outbound};

const FRAME: Duration = Duration::from_millis(16);
const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct Options {
    address: String,
    config: Option<PathBuf>,
    follow: Vec<String>,
    save: bool,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Options> {
    let mut options = Options::default();
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a file")?;
                options.config = Some(PathBuf::from(path));
            },
            "--follow" => {
                let title = args.next().context("--follow needs a title")?;
                options.follow.push(title);
            },
            "--save" => options.save = true,
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ if options.address.is_empty() => options.address = arg.clone(),
            _ => bail!("unexpected argument {arg}"),
        }
    }
    if options.address.is_empty() {
        bail!("usage: folio <article-address> [--config <file>] [--follow <title>]... [--save]");
    }
    Ok(options)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args(std::env::args().skip(1))?;
    let config = match &options.config {
        Some(path) => ArticleConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ArticleConfig::default(),
    };
    log::info!(
        "Starting folio (theme {}, scheme {}://)",
        config.theme,
        config.scheme
    );

    let network = Arc::new(HttpClient::new());
    if !network.supports_https() {
        log::warn!("Built without TLS; HTTPS fetches will fail");
    }
    let fetcher = CachedContentFetcher::new(
        &config.scheme,
        config.cache_size_bytes(),
        Arc::clone(&network) as Arc<dyn NetworkClient>,
    );

    let (outbox, inbox) = mpsc::channel();
    let deps = ArticleDeps {
        fetcher: Arc::new(fetcher),
        images: Rc::new(ThreadedImageFetcher::new(network)),
        metadata: Rc::new(MemoryMetadataStore::new()),
        views: Rc::new(HeadlessViewFactory::new(outbox)),
        alerts: Rc::new(LogAlertSink),
        process_pool: ProcessPool::global(),
        config: Rc::new(config),
    };

    let mut stack = NavigationStack::new(deps);
    stack.open(&options.address)?;
    run_until_settled(&mut stack, &inbox)?;

    if options.save
        && let Some(current) = stack.current_mut()
    {
        current.toggle_save(true);
        stack.poll();
    }

    for title in &options.follow {
        let message = folio_article::bridge::encode_event(
            &folio_article::InboundEvent::LinkActivated {
                title: title.clone(),
            },
        )?;
        let Some(top) = stack.current().map(|o| o.surface_id()) else {
            bail!("no article open");
        };
        let depth = stack.depth();
        stack.handle_message(top, &message)?;
        if stack.depth() == depth {
            log::warn!("Link {title:?} did not open an article");
            continue;
        }
        run_until_settled(&mut stack, &inbox)?;
    }

    for (depth, reference) in stack.history().iter().enumerate() {
        log::info!("#{depth}: {reference}");
    }
    Ok(())
}

/// Pump bridge messages, completions and animation until the top article
/// is ready, revealed and no longer waiting for its lead image.
fn run_until_settled(stack: &mut NavigationStack, inbox: &Receiver<Outbound>) -> Result<()> {
    let started = Instant::now();
    let mut last = started;
    loop {
        while let Ok((from, message)) = inbox.try_recv() {
            stack.handle_message(from, &message)?;
        }
        stack.poll();
        let now = Instant::now();
        stack.tick(now.duration_since(last).as_millis() as u32);
        last = now;

        let Some(current) = stack.current() else {
            bail!("no article open");
        };
        let settled = current.state() == ViewState::Data
            && current.is_revealed()
            && !current.is_animating()
            && current.lead_image_in_flight().is_none();
        if settled {
            log::info!(
                "{} ready in {}ms (lead image: {})",
                current.reference(),
                started.elapsed().as_millis(),
                current
                    .lead_image()
                    .map_or("none".to_string(), |i| format!("{}x{}", i.width, i.height))
            );
            return Ok(());
        }
        if started.elapsed() > LOAD_TIMEOUT {
            bail!(
                "{} not ready after {}s (state {})",
                current.reference(),
                LOAD_TIMEOUT.as_secs(),
                current.state()
            );
        }
        std::thread::sleep(FRAME);
    }
}
