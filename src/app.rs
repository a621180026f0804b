use crate::backend::CountryProvider;
use crate::config::Config;
use crate::conversation::{ConversationStore, Exchange};
use crate::flow::{self, FlowError, VerifyFlow};
use crate::forms::{LoginForm, SignupForm};
use crate::models::{Chatroom, Message};
use crate::notify::{Notifier, Toast};
use crate::route::Route;
use crate::session::{SessionStatus, SessionStore};
use crate::view::{ChatView, DashboardView};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tracing::{debug, info};
use uuid::Uuid;

const ASSISTANT_NAME: &str = "Gemini";

enum Screen {
    Landing,
    Login,
    Signup,
    Verify(VerifyFlow),
    Dashboard(DashboardView),
    Chat(ChatView),
}

/// Line-oriented terminal front end. One screen at a time, chosen by [`Route`].
pub struct App {
    config: Config,
    session: Arc<SessionStore>,
    conversations: Arc<ConversationStore>,
    countries: Arc<dyn CountryProvider>,
    notifier: Arc<dyn Notifier>,
    screen: Screen,
    /// Rooms as last listed on the dashboard, for `open 2` / `delete 2`.
    listed: Vec<Chatroom>,
}

impl App {
    pub fn new(
        config: Config,
        session: Arc<SessionStore>,
        conversations: Arc<ConversationStore>,
        countries: Arc<dyn CountryProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            session,
            conversations,
            countries,
            notifier,
            screen: Screen::Landing,
            listed: Vec::new(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let start = match self.session.status().await {
            SessionStatus::Authenticated => Route::Dashboard,
            SessionStatus::CodeSent | SessionStatus::Anonymous => Route::Landing,
        };
        self.navigate(start).await;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match self.next_event(&mut lines).await? {
                Event::Line(Some(line)) => line,
                Event::Line(None) => break,
                Event::Exchange(exchange) => {
                    self.show_exchange(&exchange);
                    continue;
                }
            };

            let line = line.trim();
            if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
                break;
            }
            if let Some(path) = line.strip_prefix("go ") {
                match Route::parse(path.trim()) {
                    Some(route) => self.navigate(route).await,
                    None => println!("Unknown page: {}", path.trim()),
                }
                continue;
            }
            if let Some(next) = self.handle(line).await {
                self.navigate(next).await;
            }
        }

        info!("Leaving chat");
        Ok(())
    }

    async fn next_event(
        &mut self,
        lines: &mut tokio::io::Lines<BufReader<Stdin>>,
    ) -> Result<Event> {
        match &mut self.screen {
            Screen::Chat(view) => {
                tokio::select! {
                    line = lines.next_line() => Ok(Event::Line(line?)),
                    Some(exchange) = view.next_exchange() => Ok(Event::Exchange(exchange)),
                }
            }
            _ => Ok(Event::Line(lines.next_line().await?)),
        }
    }

    async fn navigate(&mut self, route: Route) {
        let route = route.guard(self.session.is_authenticated().await);
        debug!("Navigating to {}", route);

        self.screen = match route {
            Route::Landing => {
                println!("\nGemini Chat. Commands: login, signup, go <path>, quit");
                Screen::Landing
            }
            Route::Login => {
                println!("\nLog in. Enter: <dial code> <phone number>   (or: countries, back)");
                Screen::Login
            }
            Route::Signup => {
                println!(
                    "\nSign up. Enter: <name> <dial code> <phone number>   (or: countries, back)"
                );
                Screen::Signup
            }
            Route::Verify { .. } => {
                let Some(flow) = VerifyFlow::from_route(&route, self.config.resend_cooldown)
                else {
                    return;
                };
                println!(
                    "\nEnter the 6-digit code sent to {}   (or: resend, back)",
                    flow.phone()
                );
                Screen::Verify(flow)
            }
            Route::Dashboard => {
                let mut view = DashboardView::new(
                    self.session.clone(),
                    self.conversations.clone(),
                    self.notifier.clone(),
                    self.config.search_debounce,
                );
                if let Some(user) = self.session.user().await {
                    println!("\nSigned in as {} ({})", user.name, user.phone);
                }
                println!(
                    "Commands: list, search <text>, new <title>, open <n>, delete <n>, logout"
                );
                self.listed = view.chatrooms().await;
                print_rooms(&self.listed, view.empty_text());
                Screen::Dashboard(view)
            }
            Route::Chat { id } => {
                match ChatView::open(
                    &self.session,
                    self.conversations.clone(),
                    self.notifier.clone(),
                    id,
                )
                .await
                {
                    Ok(view) => {
                        println!(
                            "\n# {}   (type to chat; /older, /image <path>, /back)",
                            view.chatroom().title
                        );
                        for msg in view.messages() {
                            print_message(msg);
                        }
                        Screen::Chat(view)
                    }
                    Err(redirect) => return Box::pin(self.navigate(redirect)).await,
                }
            }
        };
    }

    async fn handle(&mut self, line: &str) -> Option<Route> {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        if matches!(self.screen, Screen::Login | Screen::Signup) {
            match command {
                "back" => return Some(Route::Landing),
                "countries" => {
                    self.print_countries().await;
                    return None;
                }
                _ => {}
            }
        }

        match &mut self.screen {
            Screen::Landing => match command {
                "login" => Some(Route::Login),
                "signup" => Some(Route::Signup),
                "" => None,
                _ => {
                    println!("Unknown command: {}", command);
                    None
                }
            },
            Screen::Login => {
                let (country_code, phone_number) = split_phone(line);
                let form = LoginForm {
                    country_code,
                    phone_number,
                };
                report(flow::start_login(&self.session, self.notifier.as_ref(), &form).await)
            }
            Screen::Signup => {
                let (name, country_code, phone_number) = split_signup(line);
                let form = SignupForm {
                    name,
                    country_code,
                    phone_number,
                };
                report(flow::start_signup(&self.session, self.notifier.as_ref(), &form).await)
            }
            Screen::Verify(verify) => match command {
                "back" => Some(Route::Landing),
                "resend" => {
                    if let Err(e) = verify.resend(&self.session, self.notifier.as_ref()).await {
                        println!("{}", e);
                    }
                    None
                }
                _ => report(
                    verify
                        .submit(&self.session, self.notifier.as_ref(), line)
                        .await
                        .map(|_| Route::Dashboard),
                ),
            },
            Screen::Dashboard(view) => match command {
                "" | "list" => {
                    view.set_query("");
                    view.settle().await;
                    self.listed = view.chatrooms().await;
                    print_rooms(&self.listed, view.empty_text());
                    None
                }
                "search" => {
                    view.set_query(rest);
                    view.settle().await;
                    self.listed = view.chatrooms().await;
                    print_rooms(&self.listed, view.empty_text());
                    None
                }
                "new" => {
                    match view.create(rest).await {
                        Ok(_) => {
                            self.listed = view.chatrooms().await;
                            print_rooms(&self.listed, view.empty_text());
                        }
                        Err(e) => println!("{}", e),
                    }
                    None
                }
                "open" => match pick(&self.listed, rest) {
                    Some(id) => Some(Route::Chat { id }),
                    None => {
                        println!("No such chatroom: {}", rest);
                        None
                    }
                },
                "delete" => {
                    if let Some(id) = pick(&self.listed, rest) {
                        view.delete(id).await;
                        self.listed = view.chatrooms().await;
                        print_rooms(&self.listed, view.empty_text());
                    } else {
                        println!("No such chatroom: {}", rest);
                    }
                    None
                }
                "logout" => Some(view.logout().await),
                _ => {
                    println!("Unknown command: {}", command);
                    None
                }
            },
            Screen::Chat(view) => match command {
                "/back" => Some(Route::Dashboard),
                "/older" => {
                    let loaded = view.load_older().await;
                    if loaded == 0 && !view.has_more() {
                        println!("(no older messages)");
                    }
                    for msg in view.messages() {
                        print_message(msg);
                    }
                    None
                }
                "/image" => {
                    if view
                        .send_image(Path::new(rest), self.config.max_image_bytes)
                        .await
                        .is_some()
                    {
                        print_last(view).await;
                    }
                    None
                }
                _ => {
                    match view.send_text(line).await {
                        Ok(Some(_)) => print_last(view).await,
                        Ok(None) => {}
                        Err(e) => println!("{}", e),
                    }
                    None
                }
            },
        }
    }

    fn show_exchange(&self, exchange: &Exchange) {
        match &exchange.reply {
            Some(reply) => print_message(reply),
            None => self
                .notifier
                .notify(Toast::error("No reply received. Please try again.")),
        }
    }

    async fn print_countries(&self) {
        match self.countries.countries().await {
            Ok(countries) => {
                for country in countries {
                    println!(
                        "  {} {:<16} {} {}",
                        country.flag, country.name, country.code, country.dial_code
                    );
                }
            }
            Err(e) => println!("Could not load countries: {}", e),
        }
    }
}

enum Event {
    Line(Option<String>),
    Exchange(Exchange),
}

fn report(result: std::result::Result<Route, FlowError>) -> Option<Route> {
    match result {
        Ok(route) => Some(route),
        Err(e) => {
            println!("{}", e);
            None
        }
    }
}

/// `+1 5551234567` or `+15551234567`.
fn split_phone(input: &str) -> (String, String) {
    let input = input.trim();
    if let Some((code, number)) = input.split_once(char::is_whitespace) {
        return (code.to_string(), number.trim().to_string());
    }
    (String::new(), input.to_string())
}

/// `<name...> <dial code> <number>`; the name may contain spaces.
fn split_signup(input: &str) -> (String, String, String) {
    let mut parts: Vec<&str> = input.split_whitespace().collect();
    let number = parts.pop().unwrap_or_default().to_string();
    let code = parts.pop().unwrap_or_default().to_string();
    (parts.join(" "), code, number)
}

/// A 1-based index into the last listing, or a room id.
fn pick(rooms: &[Chatroom], arg: &str) -> Option<Uuid> {
    if let Ok(n) = arg.parse::<usize>() {
        return rooms.get(n.checked_sub(1)?).map(|room| room.id);
    }
    let id = Uuid::parse_str(arg).ok()?;
    rooms.iter().any(|room| room.id == id).then_some(id)
}

fn print_rooms(rooms: &[Chatroom], empty: &str) {
    if rooms.is_empty() {
        println!("  {}", empty);
        return;
    }
    for (i, room) in rooms.iter().enumerate() {
        println!(
            "  {:>2}. {:<32} {:>3} messages   updated {}",
            i + 1,
            room.title,
            room.message_count,
            room.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
}

fn print_message(msg: &Message) {
    let who = if msg.is_user() { "You" } else { ASSISTANT_NAME };
    let time = msg.timestamp.format("%H:%M");
    if let Some(image) = &msg.image {
        println!("[{}] {}: [image {}, {} bytes]", time, who, image.mime, image.byte_len());
    }
    if !msg.content.is_empty() {
        println!("[{}] {}: {}", time, who, msg.content);
    }
}

async fn print_last(view: &ChatView) {
    if let Some(msg) = view.messages().last() {
        print_message(msg);
    }
    if view.is_typing().await {
        println!("{} is typing...", ASSISTANT_NAME);
    }
}
