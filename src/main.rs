mod app;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};

use timeline_client::config::{self, Config};

use app::{AppModel, Message};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::resolve();
    let token = config::auth_token();
    let (mut app, init) = AppModel::init(config, token)?;

    let mut running: FuturesUnordered<BoxFuture<'static, Message>> = FuturesUnordered::new();
    init.spawn_into(&mut running);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", app.render());

    loop {
        let task = tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => app.update(Message::parse(&line)),
                None => break,
            },
            Some(message) = running.next(), if !running.is_empty() => app.update(message),
        };
        task.spawn_into(&mut running);

        if app.should_quit() {
            break;
        }
        println!("\n{}", app.render());
    }

    Ok(())
}
