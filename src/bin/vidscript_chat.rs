use dotenvy::dotenv;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use vidscript::conversation::{Category, ConversationController, ConversationState, Sender};
use vidscript::{logging, ClientConfig, HttpRelayClient};

#[derive(Debug, PartialEq)]
enum Command {
    Category(String),
    Thumbnail(PathBuf),
    Hashtags,
    Script,
    /// Empty text means "read the new script from the following lines".
    Edit(String),
    Help,
    Quit,
    Message(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };
    match head {
        "/category" => Command::Category(rest.to_string()),
        "/thumbnail" if rest.is_empty() => Command::Thumbnail(PathBuf::from("thumbnail.png")),
        "/thumbnail" => Command::Thumbnail(PathBuf::from(rest)),
        "/hashtags" => Command::Hashtags,
        "/script" => Command::Script,
        "/edit" => Command::Edit(rest.to_string()),
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Message(line.to_string()),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /category <name>   Tech, Gaming, Vlogging, Educational, Comedy, DIY, Custom or your own");
    println!("  /thumbnail [path]  generate a thumbnail and save it (default thumbnail.png)");
    println!("  /hashtags          generate hashtags for the current script");
    println!("  /script            print the current script");
    println!("  /edit [text]       replace the script; without text, type it and end with a line holding only .");
    println!("  /quit              leave");
    println!("Anything else is sent as a chat message.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    logging::init_logging("warn,vidscript=info")?;

    let config = ClientConfig::from_env();
    println!("🎬 VidScript - AI video script assistant");
    println!("==========================================");
    println!("Relay: {}", config.server_url);
    print_help();

    let controller = ConversationController::new(Arc::new(HttpRelayClient::new(config.server_url)));
    let mut printed = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        // print whatever the last action appended
        let snapshot = controller.snapshot().await;
        for message in &snapshot.messages()[printed..] {
            match message.sender {
                Sender::User => println!("🧑 {}", message.text),
                Sender::Assistant => println!("🤖 {}\n", message.text),
            }
        }
        printed = snapshot.messages().len();

        let prompt = match snapshot.state() {
            ConversationState::SelectingCategory => "category> ",
            ConversationState::AwaitingTopic => "topic> ",
            ConversationState::Editing => "edit> ",
        };
        print!("{}", prompt);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let result = match parse_command(&line) {
            Command::Quit => break,
            Command::Help => {
                print_help();
                Ok(())
            }
            Command::Script => {
                match controller.snapshot().await.script() {
                    Some(script) => println!("{}\n", script),
                    None => println!("No script yet.\n"),
                }
                Ok(())
            }
            Command::Category(name) => match name.parse::<Category>() {
                Ok(category) => controller.select_category(category).await,
                Err(e) => {
                    eprintln!("❌ {}", e);
                    Ok(())
                }
            },
            Command::Edit(mut text) => {
                if text.is_empty() {
                    println!("Type the new script, then a line with only \".\":");
                    let mut script = Vec::new();
                    while let Some(line) = lines.next_line().await? {
                        if line.trim() == "." {
                            break;
                        }
                        script.push(line);
                    }
                    text = script.join("\n");
                }
                let result = controller.edit_script(&text).await;
                if result.is_ok() {
                    println!("✏️  Script updated.\n");
                }
                result
            }
            Command::Message(text) => controller.submit_message(&text).await,
            Command::Hashtags => {
                let result = controller.generate_hashtags().await;
                match controller.snapshot().await.hashtags() {
                    Some(hashtags) => println!("🏷️  {}\n", hashtags),
                    None => println!("No hashtags yet (generate a script first).\n"),
                }
                result
            }
            Command::Thumbnail(path) => {
                let result = controller.generate_thumbnail().await;
                if let Some(thumbnail) = controller.snapshot().await.thumbnail() {
                    tokio::fs::write(&path, thumbnail.bytes()).await?;
                    println!("🖼️  Thumbnail ({}) saved to {}\n", thumbnail.mime_type(), path.display());
                } else {
                    println!("No thumbnail yet (a topic is needed first).\n");
                }
                result
            }
        };

        if let Err(e) = result {
            eprintln!("❌ {}", e);
        }
    }

    println!("👋 Bye!");
    Ok(())
}
