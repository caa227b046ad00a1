use crate::config::widget::WidgetConfig;
use crate::models::chat::{ ChatMessage, Role };
use crate::session::{ ChatSession, SessionState, SubmitRejected };
use crate::session::transport::{ ChatTransport, HttpTransport };
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, BufReader };

pub async fn run_chat(
    server_url: &str,
    widget: &WidgetConfig
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let session = ChatSession::new(HttpTransport::new(server_url), widget);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut out = std::io::stdout();

    println!("{}", widget.main_heading);
    if let Some(sub) = &widget.sub_heading {
        println!("{}", sub);
    }
    chat_loop(&session, stdin, &mut out, &widget.input_placeholder).await
}

/// Reads one message per line until EOF and prints every new transcript entry.
pub async fn chat_loop<T, R, W>(
    session: &ChatSession<T>,
    input: R,
    out: &mut W,
    placeholder: &str
) -> Result<(), Box<dyn Error + Send + Sync>>
    where T: ChatTransport, R: AsyncBufRead + Unpin, W: Write
{
    let mut shown = 0;
    if session.start().await == SessionState::Unavailable {
        print_new(session, &mut shown, out)?;
        return Ok(());
    }
    print_new(session, &mut shown, out)?;

    let mut lines = input.lines();
    loop {
        write!(out, "{} > ", placeholder)?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match session.submit(&line).await {
            Ok(_) => print_new(session, &mut shown, out)?,
            Err(SubmitRejected::EmptyInput) => continue,
            Err(e) => writeln!(out, "[{}]", e)?,
        }
    }
    writeln!(out)?;
    Ok(())
}

fn print_new<T: ChatTransport, W: Write>(
    session: &ChatSession<T>,
    shown: &mut usize,
    out: &mut W
) -> std::io::Result<()> {
    let messages = session.messages();
    for msg in messages.iter().skip(*shown) {
        writeln!(out, "{}", render(msg))?;
    }
    *shown = messages.len();
    Ok(())
}

fn render(msg: &ChatMessage) -> String {
    match msg.role {
        Role::User => format!("you: {}", msg.content),
        Role::Assistant => format!("assistant: {}", msg.content),
    }
}
