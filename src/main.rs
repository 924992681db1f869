use std::env::args;
use std::future::Future;
use std::pin::Pin;
use std::process::exit;
use std::sync::Arc;

use murmur::app_error::AppError;
use murmur::gemini::{Request, RouteFlags, Router, Writer};
use murmur::handlers;
use murmur::server::{Conn, Handler, Server};
use murmur::AppConfig;
use tracing::Level;

fn main() {
    let _guard = sentry::init(sentry::ClientOptions {
        release: sentry::release_name!(),
        ..Default::default()
    });

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async {
            let args: Vec<String> = args().collect();
            if args.len() < 2 {
                println!("usage: {} CFG", args.first().map(String::as_str).unwrap_or("murmur"));
                exit(1);
            }

            let cfg: AppConfig = AppConfig::new_from_file_and_env(&args[1]).unwrap_or_else(|e| {
                eprintln!("error: {e}");
                exit(1);
            });

            let subscriber = tracing_subscriber::fmt().with_max_level(Level::DEBUG).finish();
            let _ = tracing::subscriber::set_global_default(subscriber);

            tracing::debug!(?cfg, "starting murmur");

            let db = cfg.connect_database().await.unwrap_or_else(|e| {
                eprintln!("error connecting to database: {e}");
                exit(1);
            });

            let router = build_router();
            let handler = Handler::new(cfg, db, router);

            let server = Server::new(handler).unwrap_or_else(|e| {
                eprintln!("error starting server: {e}");
                exit(1);
            });

            if let Err(e) = server.serve().await {
                eprintln!("server error: {e}");
                exit(1);
            }
        });
}

/// Generates the `HandlerFn`-shaped free function `Router::route` needs
/// around an `async fn(&Handler, &mut Writer<Conn>, &Request, Vec<String>)`
/// handler, since a non-capturing closure doesn't reliably infer the
/// higher-ranked lifetime `HandlerFn` requires.
macro_rules! handler_fn {
    ($name:ident, $target:expr) => {
        fn $name<'a>(
            h: &'a Arc<Handler>,
            w: &'a mut Writer<Conn>,
            r: &'a Request,
            c: Vec<String>,
        ) -> Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'a>> {
            Box::pin($target(h, w, r, c))
        }
    };
}

handler_fn!(radio_h, handlers::radio::view);
handler_fn!(inbox_h, handlers::inbox::view);
handler_fn!(outbox_h, handlers::outbox::view);
handler_fn!(communities_h, handlers::communities::view);
handler_fn!(resolve_h, handlers::resolve::view);
handler_fn!(register_h, handlers::register::view);
handler_fn!(follow_h, handlers::follow::follow);
handler_fn!(unfollow_h, handlers::follow::unfollow);
handler_fn!(followers_h, handlers::followers::view);
handler_fn!(pending_h, handlers::pending::view);
handler_fn!(pending_accept_h, handlers::pending::accept);
handler_fn!(pending_reject_h, handlers::pending::reject);
handler_fn!(alias_h, handlers::alias::view);
handler_fn!(move_h, handlers::move_actor::view);
handler_fn!(fts_h, handlers::fts::view);
handler_fn!(firehose_h, handlers::firehose::view);
handler_fn!(upload_public_h, handlers::upload::public);
handler_fn!(upload_followers_h, handlers::upload::followers);
handler_fn!(upload_dm_h, handlers::upload::dm);
handler_fn!(upload_reply_h, handlers::upload::reply);

/// Explicit construction in `main` rather than module-load-time global
/// registration. `/users/` paths require a client certificate except
/// `register` (which gates on the connection's raw certificate itself)
/// and the two alias-free `outbox`/`fts` reads that also work
/// unauthenticated.
fn build_router() -> Router {
    Router::new()
        .route("radio", r"/users", RouteFlags::none().requires_auth(), radio_h)
        .route(
            "inbox",
            r"/users/inbox/(\d{4}-\d{2}-\d{2})",
            RouteFlags::none().requires_auth().user_menu(),
            inbox_h,
        )
        .route("outbox-public", r"/outbox/(.+)", RouteFlags::none(), outbox_h)
        .route("outbox-users", r"/users/outbox/(.+)", RouteFlags::none(), outbox_h)
        .route("communities", r"/users/communities", RouteFlags::none(), communities_h)
        .route(
            "resolve",
            r"/users/resolve",
            RouteFlags::none().requires_auth(),
            resolve_h,
        )
        .route("register", r"/users/register", RouteFlags::none(), register_h)
        .route(
            "follow",
            r"/users/follow/(.+)",
            RouteFlags::none().requires_auth(),
            follow_h,
        )
        .route(
            "unfollow",
            r"/users/unfollow/(.+)",
            RouteFlags::none().requires_auth(),
            unfollow_h,
        )
        .route(
            "followers",
            r"/users/followers",
            RouteFlags::none().requires_auth().user_menu(),
            followers_h,
        )
        .route(
            "follows-pending",
            r"/users/follows/pending",
            RouteFlags::none().requires_auth().user_menu(),
            pending_h,
        )
        .route(
            "follows-accept",
            r"/users/follows/accept/(.+)",
            RouteFlags::none().requires_auth(),
            pending_accept_h,
        )
        .route(
            "follows-reject",
            r"/users/follows/reject/(.+)",
            RouteFlags::none().requires_auth(),
            pending_reject_h,
        )
        .route(
            "alias",
            r"/users/alias",
            RouteFlags::none().requires_auth().throttle("actor-edit"),
            alias_h,
        )
        .route(
            "move",
            r"/users/move",
            RouteFlags::none().requires_auth().throttle("actor-edit"),
            move_h,
        )
        .route("fts", r"/users/fts", RouteFlags::none().user_menu(), fts_h)
        .route(
            "firehose",
            r"/users/firehose",
            RouteFlags::none().requires_auth().user_menu(),
            firehose_h,
        )
        .route(
            "upload-public",
            r"/users/upload/public",
            RouteFlags::none().requires_auth(),
            upload_public_h,
        )
        .route(
            "upload-followers",
            r"/users/upload/followers",
            RouteFlags::none().requires_auth(),
            upload_followers_h,
        )
        .route(
            "upload-dm",
            r"/users/upload/dm/(.+)",
            RouteFlags::none().requires_auth(),
            upload_dm_h,
        )
        .route(
            "upload-reply",
            r"/users/upload/reply/(.+)",
            RouteFlags::none().requires_auth(),
            upload_reply_h,
        )
}
