use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tableside::server::controller::orders::RESTAURANT_HEADER;
use tableside::server::model::bill::GetBillResponse;
use tableside::server::model::event::LiveEvent;
use tableside::server::model::money::Money;
use tableside::server::model::order::{GetOrdersResponse, Order, OrderId, PatchOrdersResponse, PostOrderResponse};
use tableside::server::model::request::{
    GetRequestsResponse, PostRequestResponse, RequestId, RequestResponse, ServiceRequest,
};
use tableside::server::model::table::GetSessionResponse;
use tokio::{select, signal, time};

#[derive(Parser, Debug)]
#[command(name = "tableside")]
#[command(about = "client cli used by restaurant staffs to interact with the server", version, long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// order related ops
    #[command(arg_required_else_help = true)]
    Order(OrderArgs),
    /// waiter and bill calls
    #[command(arg_required_else_help = true)]
    Request(RequestArgs),
    /// table session and bill
    #[command(arg_required_else_help = true)]
    Table(TableArgs),
    /// follow new orders and requests live
    Watch {
        #[arg(short = 'r', long, help = "Restaurant to follow")]
        restaurant: Option<String>,
    },
}

#[derive(Debug, Args)]
struct OrderArgs {
    #[command(subcommand)]
    command: OrderCmds,
}

#[derive(Debug, Subcommand)]
enum OrderCmds {
    #[command(arg_required_else_help = true)]
    Place {
        #[arg(short = 'r', long)]
        restaurant: String,
        #[arg(short = 't', long)]
        table: String,
        #[arg(long, help = "Items as NAME:QUANTITY:PRICE.", value_name = "ITEM", num_args = 1.., value_parser = parse_item)]
        items: Vec<ItemArg>,
    },
    List {
        #[arg(short = 'r', long)]
        restaurant: Option<String>,
        #[arg(short = 't', long)]
        table: Option<String>,
        #[arg(short = 's', long, help = "pending, served or paid")]
        status: Option<String>,
        #[arg(long, help = "Only unpaid orders")]
        active: bool,
    },
    #[command(arg_required_else_help = true)]
    Serve {
        #[arg(num_args = 1..)]
        ids: Vec<OrderId>,
    },
    #[command(arg_required_else_help = true)]
    Pay {
        #[arg(num_args = 1..)]
        ids: Vec<OrderId>,
    },
}

#[derive(Debug, Args)]
struct RequestArgs {
    #[command(subcommand)]
    command: RequestCmds,
}

#[derive(Debug, Subcommand)]
enum RequestCmds {
    #[command(arg_required_else_help = true)]
    Call {
        #[arg(short = 'r', long)]
        restaurant: String,
        #[arg(short = 't', long)]
        table: String,
        #[arg(short = 'k', long, help = "waiter or bill")]
        kind: String,
    },
    #[command(arg_required_else_help = true)]
    List {
        #[arg(short = 'r', long)]
        restaurant: String,
        #[arg(short = 't', long)]
        table: Option<String>,
        #[arg(short = 's', long, help = "pending or resolved")]
        status: Option<String>,
    },
    #[command(arg_required_else_help = true)]
    Resolve { id: RequestId },
    #[command(arg_required_else_help = true)]
    Delete { id: RequestId },
}

#[derive(Debug, Args)]
struct TableArgs {
    #[arg(short = 'r', long)]
    restaurant: Option<String>,
    #[command(subcommand)]
    command: TableCmds,
}

#[derive(Debug, Subcommand)]
enum TableCmds {
    #[command(arg_required_else_help = true)]
    Session { table: String },
    #[command(arg_required_else_help = true)]
    Bill {
        table: String,
        #[arg(long, help = "Print the plain-text receipt")]
        print: bool,
    },
}

#[derive(Debug, Clone)]
struct ItemArg {
    name: String,
    quantity: u32,
    price: Money,
}

fn parse_item(s: &str) -> Result<ItemArg, String> {
    let mut parts = s.rsplitn(3, ':');
    let (price, quantity, name) = match (parts.next(), parts.next(), parts.next()) {
        (Some(price), Some(quantity), Some(name)) if !name.is_empty() => (price, quantity, name),
        _ => return Err(format!("expected NAME:QUANTITY:PRICE, got {s}")),
    };
    Ok(ItemArg {
        name: name.to_string(),
        quantity: quantity.parse().map_err(|_| format!("invalid quantity {quantity}"))?,
        price: price.parse().map_err(|_| format!("invalid price {price}"))?,
    })
}

const DEFAULT_HOST: &str = "http://localhost:8080";
const RESYNC_INTERVAL: Duration = Duration::from_secs(5);
const MAX_BACKOFF_MS: u64 = 30_000;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Cli::parse();
    let api = Api {
        client: Client::new(),
        host: env::var("TABLESIDE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
    };

    match args.command {
        Commands::Order(order) => match order.command {
            OrderCmds::Place { restaurant, table, items } => {
                let items: Vec<_> = items
                    .iter()
                    .map(|i| json!({"name": i.name, "quantity": i.quantity, "price": i.price}))
                    .collect();
                let res: PostOrderResponse = api
                    .send(api.client.post(api.url("v1/orders")).json(&json!({
                        "restaurantId": restaurant,
                        "table": table,
                        "items": items,
                    })))
                    .await?;
                println!("placed {}", describe_order(&res.order));
            }
            OrderCmds::List { restaurant, table, status, active } => {
                let mut query = vec![];
                if let Some(table) = table {
                    query.push(("table", table));
                }
                if let Some(status) = status {
                    query.push(("status", status));
                }
                if active {
                    query.push(("active", "true".to_string()));
                }
                let res: GetOrdersResponse = api
                    .send(api.scoped(api.client.get(api.url("v1/orders")), restaurant.as_deref()).query(&query))
                    .await?;
                res.orders.iter().for_each(|o| println!("{}", describe_order(o)));
            }
            OrderCmds::Serve { ids } => api.set_status(ids, "served").await?,
            OrderCmds::Pay { ids } => api.set_status(ids, "paid").await?,
        },
        Commands::Request(request) => match request.command {
            RequestCmds::Call { restaurant, table, kind } => {
                let res: PostRequestResponse = api
                    .send(api.client.post(api.url("v1/requests")).json(&json!({
                        "restaurantId": restaurant,
                        "table": table,
                        "type": kind,
                    })))
                    .await?;
                if res.created {
                    println!("called {}", describe_request(&res.request));
                } else {
                    println!("already pending {}", describe_request(&res.request));
                }
            }
            RequestCmds::List { restaurant, table, status } => {
                let mut query = vec![("restaurantId", restaurant)];
                if let Some(table) = table {
                    query.push(("table", table));
                }
                if let Some(status) = status {
                    query.push(("status", status));
                }
                let res: GetRequestsResponse = api.send(api.client.get(api.url("v1/requests")).query(&query)).await?;
                res.requests.iter().for_each(|r| println!("{}", describe_request(r)));
            }
            RequestCmds::Resolve { id } => {
                let res: RequestResponse = api
                    .send(api.client.patch(api.url(&format!("v1/requests/{id}"))))
                    .await?;
                println!("resolved {}", describe_request(&res.request));
            }
            RequestCmds::Delete { id } => {
                let _: serde_json::Value = api
                    .send(api.client.delete(api.url(&format!("v1/requests/{id}"))))
                    .await?;
                println!("deleted request {id}");
            }
        },
        Commands::Table(table) => {
            let scope: Vec<_> = table.restaurant.iter().map(|r| ("restaurantId", r.clone())).collect();
            match table.command {
                TableCmds::Session { table } => {
                    let res: GetSessionResponse = api
                        .send(api.client.get(api.url(&format!("v1/tables/{table}/session"))).query(&scope))
                        .await?;
                    match &res.session.main {
                        None => println!("table {table} has no unpaid orders"),
                        Some(main) => {
                            println!("main   {}", describe_order(main));
                            res.session.add_ons.iter().for_each(|o| println!("add-on {}", describe_order(o)));
                        }
                    }
                }
                TableCmds::Bill { table, print: true } => {
                    let res = api
                        .client
                        .get(api.url(&format!("v1/tables/{table}/bill/print")))
                        .query(&scope)
                        .send()
                        .await?;
                    print!("{}", check(res).await?.text().await?);
                }
                TableCmds::Bill { table, print: false } => {
                    let res: GetBillResponse = api
                        .send(api.client.get(api.url(&format!("v1/tables/{table}/bill"))).query(&scope))
                        .await?;
                    for line in &res.bill.lines {
                        println!("{:>3} x {:<24} {:>8}", line.quantity, line.name, line.total);
                    }
                    println!("total {}", res.bill.total);
                }
            }
        }
        Commands::Watch { restaurant } => watch(&api, restaurant.as_deref()).await?,
    };
    Ok(())
}

struct Api {
    client: Client,
    host: String,
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.host.trim_end_matches('/'), path)
    }

    fn scoped(&self, req: RequestBuilder, restaurant: Option<&str>) -> RequestBuilder {
        match restaurant {
            Some(restaurant) => req.header(RESTAURANT_HEADER, restaurant),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> anyhow::Result<T> {
        let res = check(req.send().await?).await?;
        Ok(res.json::<T>().await.context("failed to get response, aborting")?)
    }

    async fn set_status(&self, ids: Vec<OrderId>, status: &str) -> anyhow::Result<()> {
        let res: PatchOrdersResponse = self
            .send(self.client.patch(self.url("v1/orders")).json(&json!({"ids": ids, "status": status})))
            .await?;
        let update = res.update;
        println!(
            "{} order(s) {}, {} already {}, {} refused",
            update.updated, status, update.unchanged, status, update.rejected
        );
        Ok(())
    }
}

/// Turn non-2xx answers into errors carrying the server's message.
async fn check(res: Response) -> anyhow::Result<Response> {
    match res.status() {
        status if status.is_success() => Ok(res),
        status @ (StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT) => {
            let body: serde_json::Value = res.json().await.unwrap_or_default();
            bail!("{}: {}", status, body["message"].as_str().unwrap_or("no message"))
        }
        unexpected => bail!("got unexpected status code, {}", unexpected),
    }
}

fn describe_order(order: &Order) -> String {
    let items: Vec<String> = order.items.iter().map(|i| format!("{}x {}", i.quantity, i.name)).collect();
    format!(
        "#{} table {} [{}] {} = {}",
        order.id,
        order.table,
        order.status,
        items.join(", "),
        order.total()
    )
}

fn describe_request(request: &ServiceRequest) -> String {
    format!("#{} table {} {} ({})", request.id, request.table, request.kind, request.status.as_str())
}

/// What the watcher believes is open right now.
#[derive(Default)]
struct Board {
    orders: BTreeMap<OrderId, Order>,
    requests: BTreeMap<RequestId, ServiceRequest>,
}

impl Board {
    fn summary(&self) -> String {
        format!("{} active order(s), {} pending request(s)", self.orders.len(), self.requests.len())
    }
}

async fn watch(api: &Api, restaurant: Option<&str>) -> anyhow::Result<()> {
    let mut board = Board::default();
    let mut attempt = 0u32;
    loop {
        select! {
            _ = signal::ctrl_c() => return Ok(()),
            outcome = follow(api, restaurant, &mut board, &mut attempt) => match outcome {
                Ok(()) => warn!("event stream closed by server"),
                Err(e) => warn!("event stream failed, {}", e),
            },
        }
        let delay = backoff(attempt);
        attempt = attempt.saturating_add(1);
        info!("reconnecting in {:?}", delay);
        select! {
            _ = signal::ctrl_c() => return Ok(()),
            _ = time::sleep(delay) => {},
        }
    }
}

/// Exponential backoff capped at 30s, with up to 50% random jitter.
fn backoff(attempt: u32) -> Duration {
    let base = 500u64.saturating_mul(1 << attempt.min(6)).min(MAX_BACKOFF_MS);
    Duration::from_millis(base + rand::thread_rng().gen_range(0..=base / 2))
}

/// One connection of the event stream. The board is refetched on connect and
/// every few seconds, since events missed while away are never replayed.
async fn follow(api: &Api, restaurant: Option<&str>, board: &mut Board, attempt: &mut u32) -> anyhow::Result<()> {
    let mut res = check(api.client.get(api.url("v1/events")).send().await?).await?;
    *attempt = 0;
    resync(api, restaurant, board).await;

    let mut ticker = time::interval_at(time::Instant::now() + RESYNC_INTERVAL, RESYNC_INTERVAL);
    let mut frames = FrameBuffer::default();
    loop {
        select! {
            _ = ticker.tick() => resync(api, restaurant, board).await,
            chunk = res.chunk() => match chunk? {
                None => return Ok(()),
                Some(bytes) => frames.push(&bytes).iter().for_each(|frame| apply_frame(frame, restaurant, board)),
            },
        }
    }
}

/// Reassembles SSE frames from raw chunks. Text is decoded only once a whole
/// frame has arrived, so a character split across chunks survives intact.
#[derive(Default)]
struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut frames = vec![];
        while let Some(end) = self.pending.windows(2).position(|w| w == b"\n\n") {
            let frame: Vec<u8> = self.pending.drain(..end + 2).collect();
            frames.push(String::from_utf8_lossy(&frame).into_owned());
        }
        frames
    }
}

fn apply_frame(frame: &str, restaurant: Option<&str>, board: &mut Board) {
    let (mut name, mut data) = (None, None);
    for line in frame.lines() {
        if let Some(value) = line.strip_prefix("event: ") {
            name = Some(value);
        } else if let Some(value) = line.strip_prefix("data: ") {
            data = Some(value);
        }
    }
    let (Some(name), Some(data)) = (name, data) else {
        return;
    };
    let in_scope = |id: &str| restaurant.map_or(true, |r| r == id);
    match LiveEvent::from_frame(name, data) {
        Some(LiveEvent::OrderNew(order)) if in_scope(&order.restaurant_id) => {
            println!("new order   {}", describe_order(&order));
            board.orders.insert(order.id, order);
        }
        Some(LiveEvent::RequestNew(request)) if in_scope(&request.restaurant_id) => {
            println!("new request {}", describe_request(&request));
            board.requests.insert(request.id, request);
        }
        _ => {}
    }
}

/// Replace the board with a full fetch. On failure the stale board is kept.
async fn resync(api: &Api, restaurant: Option<&str>, board: &mut Board) {
    let orders = api
        .send::<GetOrdersResponse>(
            api.scoped(api.client.get(api.url("v1/orders")), restaurant)
                .query(&[("active", "true")]),
        )
        .await;
    match orders {
        Ok(res) => board.orders = res.orders.into_iter().map(|o| (o.id, o)).collect(),
        Err(e) => warn!("order resync failed, keeping last view, {}", e),
    }

    // requests are listed per restaurant only
    if let Some(restaurant) = restaurant {
        let requests = api
            .send::<GetRequestsResponse>(
                api.client
                    .get(api.url("v1/requests"))
                    .query(&[("restaurantId", restaurant), ("status", "pending")]),
            )
            .await;
        match requests {
            Ok(res) => board.requests = res.requests.into_iter().map(|r| (r.id, r)).collect(),
            Err(e) => warn!("request resync failed, keeping last view, {}", e),
        }
    }
    println!("resynced: {}", board.summary());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_frame(id: OrderId, restaurant: &str, item: &str) -> String {
        let data = json!({
            "id": id,
            "restaurantId": restaurant,
            "table": "4",
            "items": [{"name": item, "quantity": 1, "price": 2.5}],
            "status": "pending",
            "createdAt": "2024-05-01T09:00:00Z",
        });
        format!("event: order:new\ndata: {data}\n\n")
    }

    fn request_frame(id: RequestId, restaurant: &str) -> String {
        let data = json!({
            "id": id,
            "restaurantId": restaurant,
            "table": "4",
            "type": "bill",
            "status": "pending",
            "createdAt": "2024-05-01T09:00:00Z",
        });
        format!("event: request:new\ndata: {data}\n\n")
    }

    #[test]
    fn frames_outside_the_followed_restaurant_are_ignored() {
        let mut board = Board::default();
        apply_frame(&order_frame(1, "r1", "Tea"), Some("r1"), &mut board);
        apply_frame(&order_frame(2, "r2", "Tea"), Some("r1"), &mut board);
        apply_frame(&request_frame(7, "r2"), Some("r1"), &mut board);
        apply_frame(&request_frame(8, "r1"), Some("r1"), &mut board);
        assert_eq!(board.orders.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(board.requests.keys().copied().collect::<Vec<_>>(), vec![8]);
        assert_eq!(board.orders[&1].items[0].price, Money::from_cents(250));

        let mut everything = Board::default();
        apply_frame(&order_frame(2, "r2", "Tea"), None, &mut everything);
        assert_eq!(everything.orders.len(), 1);
    }

    #[test]
    fn unknown_and_partial_frames_leave_the_board_alone() {
        let mut board = Board::default();
        for frame in [
            "retry: 3000\nevent: ready\ndata: {}\n\n".to_string(),
            ": keep-alive\n\n".to_string(),
            "event: order:cancelled\ndata: {\"id\":1}\n\n".to_string(),
            "event: order:new\n\n".to_string(),
            "event: order:new\ndata: {not json}\n\n".to_string(),
        ] {
            apply_frame(&frame, None, &mut board);
        }
        assert!(board.orders.is_empty());
        assert!(board.requests.is_empty());
    }

    #[test]
    fn frame_split_across_chunks_is_reassembled() {
        let frame = order_frame(3, "r1", "Crème brûlée");
        let bytes = frame.as_bytes();
        // cut inside the two-byte 'è'
        let cut = frame.find('è').unwrap() + 1;

        let mut frames = FrameBuffer::default();
        assert!(frames.push(&bytes[..cut]).is_empty());
        let done = frames.push(&bytes[cut..]);
        assert_eq!(done, vec![frame.clone()]);

        let mut board = Board::default();
        apply_frame(&done[0], None, &mut board);
        assert_eq!(board.orders[&3].items[0].name, "Crème brûlée");
    }

    #[test]
    fn one_chunk_may_carry_several_frames() {
        let mut frames = FrameBuffer::default();
        let chunk = format!("{}{}event: order", order_frame(1, "r1", "Tea"), request_frame(2, "r1"));
        assert_eq!(frames.push(chunk.as_bytes()).len(), 2);
        assert_eq!(frames.pending, b"event: order".to_vec());
    }

    #[test]
    fn item_name_may_contain_colons() {
        let item = parse_item("Tea:Masala:2:10").unwrap();
        assert_eq!((item.name.as_str(), item.quantity, item.price), ("Tea:Masala", 2, Money::from_units(10)));

        let item = parse_item("Soup:1:12.50").unwrap();
        assert_eq!(item.price, Money::from_cents(1250));
    }

    #[test]
    fn bad_items_are_refused() {
        assert_eq!(parse_item("Tea:two:10").unwrap_err(), "invalid quantity two");
        assert!(parse_item("Tea:-1:10").is_err());
        assert!(parse_item("Tea:1:0.001").is_err());
        assert!(parse_item(":1:10").is_err());
        assert!(parse_item("1:10").is_err());
    }

    #[test]
    fn backoff_grows_then_caps() {
        let first = backoff(0);
        assert!(first >= Duration::from_millis(500) && first <= Duration::from_millis(750));
        for attempt in [6, 20, u32::MAX] {
            let delay = backoff(attempt);
            assert!(delay >= Duration::from_millis(MAX_BACKOFF_MS), "{delay:?}");
            assert!(delay <= Duration::from_millis(MAX_BACKOFF_MS * 3 / 2), "{delay:?}");
        }
    }
}
