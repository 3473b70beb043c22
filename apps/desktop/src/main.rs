use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use client_core::{
    load_conversations, ChatEvent, ConversationClient, Message, RealtimeChannel, RestClient,
    Session, WsChannel,
};
use shared::domain::{ConversationId, DeliveryState, MessageKind, UserId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    user_id: Option<String>,
    #[arg(long)]
    username: Option<String>,
    /// Peer user id to chat with.
    #[arg(long)]
    peer: Option<String>,
    /// Existing conversation id (skips the get-or-create round-trip).
    #[arg(long)]
    conversation: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = load_settings();
    if args.server_url.is_some() {
        settings.server_url = args.server_url;
    }
    if args.token.is_some() {
        settings.token = args.token;
    }
    if args.user_id.is_some() {
        settings.user_id = args.user_id;
    }
    if args.username.is_some() {
        settings.username = args.username;
    }

    let server_url = settings
        .server_url
        .ok_or_else(|| anyhow!("missing server url (--server-url or APP__SERVER_URL)"))?;
    let token = settings
        .token
        .ok_or_else(|| anyhow!("missing auth token (--token or APP__TOKEN)"))?;
    let user_id = settings
        .user_id
        .ok_or_else(|| anyhow!("missing user id (--user-id or APP__USER_ID)"))?;
    let username = settings.username.unwrap_or_else(|| "me".to_string());

    let session = Arc::new(Session::new(server_url, UserId::new(user_id), username, token)?);
    let rest = RestClient::new(Arc::clone(&session));

    let conversations = load_conversations(&rest).await?;
    if conversations.is_empty() {
        println!("No conversations yet.");
    }
    for (index, convo) in conversations.iter().enumerate() {
        let marker = if convo.is_store { " [store]" } else { "" };
        println!(
            "{index}: {}{marker} — {} ({})",
            convo.display_name,
            convo.last_message.as_deref().unwrap_or(""),
            convo.activity_label
        );
    }

    let (peer_id, conversation_id) = match (args.peer, args.conversation) {
        (Some(peer), conversation) => (UserId::new(peer), conversation.map(ConversationId::new)),
        (None, Some(conversation)) => {
            let id = ConversationId::new(conversation);
            let convo = conversations
                .iter()
                .find(|c| c.conversation_id == id)
                .ok_or_else(|| {
                    anyhow!("conversation {id} is not in the list; pass --peer as well")
                })?;
            (convo.peer_id.clone(), Some(id))
        }
        (None, None) => return Ok(()),
    };

    let channel: Arc<dyn RealtimeChannel> = Arc::new(WsChannel::connect(&session.ws_url()).await?);
    let client = ConversationClient::open(rest, channel, peer_id, conversation_id).await?;

    for message in client.messages().await {
        print_message(&session, &message);
    }

    let mut events = client.subscribe_events();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Type a message and press enter; /quit to exit.");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ChatEvent::RemoteMessage(message)) => print_message(&session, &message),
                Ok(ChatEvent::MessageFailed(message)) => {
                    println!("  !! failed to send: {}", message.text);
                }
                Ok(ChatEvent::ChannelClosed) => {
                    println!("realtime channel closed");
                    break;
                }
                Ok(ChatEvent::Error(err)) => warn!("chat error: {err}"),
                Ok(_) => {}
                Err(_) => break,
            },
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        let line = line.trim();
                        if line == "/quit" {
                            break;
                        }
                        if line.is_empty() {
                            continue;
                        }
                        if let Err(err) = client.send_text(line).await {
                            warn!("send failed: {err}");
                        }
                    }
                    None => break,
                }
            }
        }
    }

    client.close().await;
    Ok(())
}

fn print_message(session: &Session, message: &Message) {
    let who = if message.sender_id == *session.user_id() {
        "me"
    } else {
        message.sender_name.as_deref().unwrap_or("them")
    };
    let mark = match message.delivery {
        DeliveryState::Pending => " (sending)",
        DeliveryState::Failed => " (failed)",
        DeliveryState::Delivered => "",
    };
    match message.kind {
        MessageKind::Text => println!("[{who}] {}{mark}", message.text),
        MessageKind::Image => println!("[{who}] sent an image: {}{mark}", message.text),
        MessageKind::Appointment => {
            println!("[{who}] {}{mark}", message.text);
            if let Some(appointment) = &message.appointment {
                println!(
                    "      appointment {} — {:?}, price {:.2}, paid {:.2}{}",
                    appointment.appointment_id,
                    appointment.status,
                    appointment.price,
                    appointment.paid_amount,
                    appointment
                        .transaction_id
                        .as_deref()
                        .map(|txn| format!(", txn {txn}"))
                        .unwrap_or_default()
                );
            }
        }
    }
}
