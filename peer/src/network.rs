use crate::commands::{self, Command, HELP};
use crate::session::{SessionManager, Tabletop};
use crate::transport::{EventReceiver, Rendezvous};
use log::{debug, info, warn};
use std::ops::ControlFlow;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Drives one peer: transport events and console lines are handled one at a
/// time on the same task, and every new chat log entry is printed.
pub struct PeerNode<R: Rendezvous> {
    manager: SessionManager<R>,
    tabletop: Tabletop,
    events: EventReceiver,
    printed: usize,
}

impl<R: Rendezvous> PeerNode<R> {
    pub fn new(manager: SessionManager<R>, tabletop: Tabletop, events: EventReceiver) -> Self {
        Self {
            manager,
            tabletop,
            events,
            printed: 0,
        }
    }

    pub fn manager(&self) -> &SessionManager<R> {
        &self.manager
    }

    pub fn tabletop(&self) -> &Tabletop {
        &self.tabletop
    }

    fn print_new_entries(&mut self) {
        for entry in self.tabletop.chat().since(self.printed) {
            println!("{}", entry);
        }
        self.printed = self.tabletop.chat().len();
    }

    /// Runs until `/quit`, Ctrl-C, or the event queue closes.
    ///
    /// End of input only stops reading commands; events keep being handled
    /// so a host without a terminal stays reachable.
    pub async fn run<I>(&mut self, input: I) -> Result<(), Box<dyn std::error::Error>>
    where
        I: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;
        self.print_new_entries();

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        debug!("Event: {:?}", event);
                        self.tabletop.handle_event(event);
                    }
                    None => {
                        warn!("Event queue closed");
                        break;
                    }
                },

                line = lines.next_line(), if input_open => match line? {
                    Some(line) => {
                        if self.handle_line(&line).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        info!("Input closed, still serving peers");
                        input_open = false;
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }

            self.print_new_entries();
        }

        let closed = self.tabletop.shutdown();
        info!("Closed {} connections", closed);
        self.print_new_entries();
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> ControlFlow<()> {
        match commands::parse(line) {
            Ok(Some(command)) => match self.execute(command).await {
                Ok(flow) => flow,
                Err(e) => {
                    println!("error: {}", e);
                    ControlFlow::Continue(())
                }
            },
            Ok(None) => ControlFlow::Continue(()),
            Err(e) => {
                println!("{}", e);
                ControlFlow::Continue(())
            }
        }
    }

    /// Applies one console command to the tabletop.
    pub async fn execute(
        &mut self,
        command: Command,
    ) -> Result<ControlFlow<()>, Box<dyn std::error::Error>> {
        match command {
            Command::Chat(text) => {
                self.tabletop.send_chat(&text)?;
            }
            Command::Token { color } => {
                let token = self.tabletop.create_token(color);
                println!("Created {} ({}) at {}", token.id, token.color, token.position);
            }
            Command::Move { token, position } => {
                let (stored, report) = self.tabletop.move_token(&token, position)?;
                println!("Moved {} to {} ({} peers)", token, stored, report.attempted);
            }
            Command::Roll(kind) => {
                self.tabletop.roll_dice(kind)?;
            }
            Command::Grid { width, height } => {
                self.tabletop.resize_grid(width, height)?;
                println!("Grid is now {}x{}", width, height);
            }
            Command::Background(path) => {
                let image = tokio::fs::read(&path).await?;
                let size = image.len();
                let report = self.tabletop.set_background_image(image)?;
                println!(
                    "Shared {} ({} bytes) with {} peers",
                    path.display(),
                    size,
                    report.attempted
                );
            }
            Command::Announce(text) => {
                self.tabletop.announce(&text)?;
            }
            Command::Link => match self.manager.shareable_link()? {
                Some(link) => println!("{}", link),
                None => println!("No room yet"),
            },
            Command::Tokens => {
                let board = self.tabletop.whiteboard();
                println!(
                    "Grid {}x{}, {} tokens",
                    board.grid_width(),
                    board.grid_height(),
                    board.token_count()
                );
                for token in board.tokens() {
                    println!("  {} {} at {}", token.id, token.color, token.position);
                }
            }
            Command::Peers => {
                println!("{}", self.tabletop.status());
                for peer in self.tabletop.connections().connected_peers() {
                    println!("  {}", peer);
                }
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(ControlFlow::Break(())),
        }
        Ok(ControlFlow::Continue(()))
    }
}
