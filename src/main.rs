//! Demo application: a small user service wired through the framework.

use loam::orm::{FieldDef, Query, Record, TableSchema};
use loam::web::{HandlerArgs, HandlerResult, ParamSpec, Reply, Router};
use loam::{logger, server, ApiError, Config, Db, Page, SqliteDriver, Value};
use serde_json::json;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;
    logger::init(&cfg.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.socket_addr()?;
    let db = Db::open(SqliteDriver, cfg.db).await?;

    let users = user_schema()?;
    db.execute(
        "CREATE TABLE IF NOT EXISTS `users` (\
         `id` integer PRIMARY KEY, \
         `name` varchar(128) NOT NULL, \
         `email` varchar(128) NOT NULL, \
         `admin` boolean NOT NULL)",
        Vec::new(),
    )
    .await?;

    let mut router = Router::new();
    router.get("/", "index", ParamSpec::new(), |_| async {
        Ok(Reply::text("<h1>It works.</h1>"))
    });
    router.get(
        "/api/greeting",
        "greeting",
        ParamSpec::new().required("param"),
        greeting,
    );

    {
        let db = db.clone();
        let users = Arc::clone(&users);
        router.get(
            "/api/users",
            "list_users",
            ParamSpec::new().optional("page"),
            move |args| {
                let db = db.clone();
                let users = Arc::clone(&users);
                async move { list_users(&db, &users, args).await }
            },
        );
    }
    {
        let db = db.clone();
        let users = Arc::clone(&users);
        router.post(
            "/api/users",
            "create_user",
            ParamSpec::new().required("name").required("email"),
            move |args| {
                let db = db.clone();
                let users = Arc::clone(&users);
                async move { create_user(&db, &users, args).await }
            },
        );
    }
    {
        let db = db.clone();
        let users = Arc::clone(&users);
        router.get(
            "/api/users/random",
            "random_user",
            ParamSpec::new(),
            move |_| {
                let db = db.clone();
                let users = Arc::clone(&users);
                async move { random_user(&db, &users).await }
            },
        );
    }

    let listener = server::create_reusable_listener(addr)?;
    server::serve(listener, Arc::new(router)).await?;

    db.close().await;
    Ok(())
}

fn user_schema() -> Result<Arc<TableSchema>, loam::SchemaError> {
    TableSchema::build(
        "users",
        vec![
            FieldDef::integer("id").primary_key(),
            FieldDef::string("name"),
            FieldDef::string("email"),
            FieldDef::boolean("admin").default_value(false),
        ],
    )
}

async fn greeting(args: HandlerArgs) -> HandlerResult {
    let param = args.required_str("param")?;
    Ok(Reply::msg(param))
}

async fn list_users(db: &Db, users: &Arc<TableSchema>, args: HandlerArgs) -> HandlerResult {
    let page_index = match args.get_i64("page") {
        Some(n) if n >= 1 => n as u64,
        Some(_) => return Err(ApiError::invalid_value("page").into()),
        None => 1,
    };

    let total = Record::count(db, users, "id", None, Vec::new())
        .await?
        .unwrap_or(0);
    let page = Page::with_default_size(total.max(0) as u64, page_index);

    let records = Record::find_all(
        db,
        users,
        Query::new().order_by("`id`").page(page.offset, page.limit),
    )
    .await?;

    let items: Vec<_> = records.iter().map(user_json).collect();
    Ok(Reply::json(json!({
        "page_index": page.page_index,
        "page_count": page.page_count,
        "item_count": page.item_count,
        "users": items,
    })))
}

async fn create_user(db: &Db, users: &Arc<TableSchema>, args: HandlerArgs) -> HandlerResult {
    let name = args.required_str("name")?;
    let email = args.required_str("email")?;
    if name.trim().is_empty() {
        return Err(ApiError::invalid_value("name").into());
    }
    if !email.contains('@') {
        return Err(ApiError::invalid_value("email").into());
    }

    let mut user = Record::new(users);
    user.set("name", name)?;
    user.set("email", email)?;
    user.save(db).await?;

    Ok(Reply::json(user_json(&user)))
}

async fn random_user(db: &Db, users: &Arc<TableSchema>) -> HandlerResult {
    match Record::random_one(db, users).await? {
        Some(user) => Ok(Reply::json(user_json(&user))),
        None => Err(ApiError::not_found("users").into()),
    }
}

fn user_json(user: &Record) -> serde_json::Value {
    let field = |name: &str| match user.get(name) {
        Some(Value::Null) | None => serde_json::Value::Null,
        Some(Value::Integer(n)) => json!(n),
        Some(Value::Real(f)) => json!(f),
        Some(Value::Text(s)) => json!(s),
        Some(Value::Blob(_)) => serde_json::Value::Null,
    };
    json!({
        "id": field("id"),
        "name": field("name"),
        "email": field("email"),
        "admin": field("admin"),
    })
}
