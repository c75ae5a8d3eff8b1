use anyhow::{anyhow, Context, Result};
use squawk::config::{config_path, read_config, Config};
use squawk::geometry::{Point, Size};
use squawk::popup::{Hints, Popup, PopupWindow, Urgency};
use squawk::render::{PopupRenderer, RendererConfig};
use squawk::stack::{NotifyStack, StackLocation};
use squawk::surface::{Display, PopupSurface};
use squawk::theme::theme_info;
use squawk::workarea::{FixedWorkArea, WorkAreaProvider, X11WorkArea};
use std::env;
use std::io::{self, BufRead};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: squawk [--top-left|--top-right|--bottom-left|--bottom-right] \
[--timeout ms] [--urgency low|normal|critical] [--action key=label]... [--arrow x,y] \
[--stdin] [<summary> [body...]]";

#[derive(Debug, Default)]
struct Args {
    location: Option<StackLocation>,
    timeout_ms: Option<u64>,
    urgency: Option<Urgency>,
    actions: Vec<(String, String)>,
    arrow: Option<Point>,
    stdin: bool,
    message: Option<(String, String)>,
}

struct Shown {
    popup: Popup,
    surface: PopupSurface,
    deadline: Option<Instant>,
}

struct Daemon {
    config: Config,
    display: Display,
    stack: NotifyStack,
    screen: Size,
    renderer: PopupRenderer,
    shown: Vec<Shown>,
    next_id: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = parse_args(env::args().skip(1))?;
    if args.message.is_none() && !args.stdin {
        return Err(anyhow!("missing message"));
    }

    let config = read_config().unwrap_or_else(|err| {
        if config_path().exists() {
            warn!("ignoring config: {err:#}");
        }
        Config::default()
    });
    let theme = theme_info();
    debug!(theme = %theme.name, version = %theme.version, "starting");

    let mut display = Display::connect()?;
    let provider = work_area_provider(&mut display, &config);
    let screen = popup_screen(provider.as_ref());
    let location = args.location.unwrap_or(config.location);
    let stack = NotifyStack::new(provider, config.monitor, location)
        .context("create notification stack")?;

    let renderer = PopupRenderer::new(
        RendererConfig {
            gradient_look: config.gradient_look,
            // layer-shell compositors always composite
            composited: true,
        },
        config.style(),
    );

    let mut daemon = Daemon {
        config,
        display,
        stack,
        screen,
        renderer,
        shown: Vec::new(),
        next_id: 1,
    };

    if args.message.is_some() {
        daemon.show(&args)?;
    }
    let lines = args.stdin.then(spawn_stdin_reader);
    daemon.run(lines)
}

fn work_area_provider(display: &mut Display, config: &Config) -> Rc<dyn WorkAreaProvider> {
    if let Some(size) = display.probe_work_area() {
        return Rc::new(FixedWorkArea::new(size));
    }
    let fallback = Size::new(config.screen_width, config.screen_height);
    if env::var_os("DISPLAY").is_some() {
        match X11WorkArea::connect() {
            Ok(x11) => return Rc::new(x11),
            Err(err) => warn!("no X work area: {err:#}"),
        }
    }
    Rc::new(FixedWorkArea::new(fallback))
}

/// Arrow placement clamps against the whole screen, not the work area.
fn popup_screen(provider: &dyn WorkAreaProvider) -> Size {
    provider.screen().size
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

impl Daemon {
    fn show(&mut self, args: &Args) -> Result<()> {
        let Some((summary, body)) = &args.message else {
            return Ok(());
        };
        if let Some(location) = args.location {
            self.stack.set_location(location);
        }

        let id = self.next_id;
        self.next_id += 1;
        let transparency = self
            .renderer
            .config()
            .transparency(self.config.transparency);
        let popup = Popup::new(id, self.screen, transparency);
        popup.update(|w| w.set_font(&self.config.font));
        popup.set_text(summary, body);
        if let Some(urgency) = args.urgency {
            popup.set_hints(&Hints {
                urgency: Some(urgency),
            });
        }

        let timeout = args.timeout_ms.unwrap_or(self.config.default_timeout_ms);
        let timeout_ms = i64::try_from(timeout).unwrap_or(i64::MAX);
        popup.set_timeout(timeout_ms);
        popup.tick(timeout_ms);

        for (key, label) in &args.actions {
            popup.add_action(label, key, |popup, key| {
                println!("{key}");
                popup.close();
            });
        }
        if let Some(point) = args.arrow {
            popup.set_arrow(true, point.x, point.y);
        }

        popup.update(PopupWindow::relayout)?;
        self.stack.add_window(&popup, true);

        let deadline = (timeout > 0).then(|| Instant::now() + Duration::from_millis(timeout));
        debug!(id, timeout, "show");
        let surface = self.display.create_surface(id);
        self.shown.push(Shown {
            popup,
            surface,
            deadline,
        });
        Ok(())
    }

    fn read_lines(&mut self, lines: &Receiver<String>) -> Result<bool> {
        loop {
            match lines.try_recv() {
                Ok(line) => {
                    let words = match shell_words::split(&line) {
                        Ok(words) => words,
                        Err(err) => {
                            warn!("skipping input line: {err}");
                            continue;
                        }
                    };
                    match parse_args(words) {
                        Ok(args) => self.show(&args)?,
                        Err(err) => warn!("skipping input line: {err:#}"),
                    }
                }
                Err(TryRecvError::Empty) => return Ok(true),
                Err(TryRecvError::Disconnected) => return Ok(false),
            }
        }
    }

    fn expire(&mut self) {
        for id in self.display.take_closed() {
            if let Some(shown) = self.shown.iter().find(|s| s.popup.id() == id) {
                shown.popup.close();
            }
        }

        let now = Instant::now();
        for shown in &self.shown {
            let Some(deadline) = shown.deadline else {
                continue;
            };
            let remaining = deadline.saturating_duration_since(now);
            if remaining.is_zero() {
                shown.popup.close();
                continue;
            }
            // The pie only needs a new frame every 100ms.
            let ms = i64::try_from(remaining.as_millis() / 100 * 100).unwrap_or(i64::MAX);
            if ms != shown.popup.borrow().remaining() {
                shown.popup.tick(ms);
            }
        }

        // Dropping a surface unmaps it.
        self.shown.retain(|s| !s.popup.is_closed());
    }

    fn run(&mut self, lines: Option<Receiver<String>>) -> Result<()> {
        let mut reading = lines.is_some();
        loop {
            self.display.dispatch()?;
            if let Some(lines) = lines.as_ref().filter(|_| reading) {
                reading = self.read_lines(lines)?;
            }
            self.expire();

            for shown in &mut self.shown {
                self.display
                    .present(&mut shown.surface, &shown.popup, &self.renderer)?;
            }

            if self.shown.is_empty() && !reading {
                self.stack.destroy();
                return Ok(());
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

fn parse_args(words: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    let mut rest: Vec<String> = Vec::new();
    let mut iter = words.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--top-left" {
            args.location = Some(StackLocation::TopLeft);
        } else if arg == "--top-right" {
            args.location = Some(StackLocation::TopRight);
        } else if arg == "--bottom-left" {
            args.location = Some(StackLocation::BottomLeft);
        } else if arg == "--bottom-right" {
            args.location = Some(StackLocation::BottomRight);
        } else if arg == "--timeout" {
            let val = iter
                .next()
                .ok_or_else(|| anyhow!("--timeout requires a value"))?;
            args.timeout_ms = Some(val.parse()?);
        } else if let Some(val) = arg.strip_prefix("--timeout=") {
            args.timeout_ms = Some(val.parse()?);
        } else if arg == "--urgency" {
            let val = iter
                .next()
                .ok_or_else(|| anyhow!("--urgency requires a value"))?;
            args.urgency = Some(val.parse()?);
        } else if let Some(val) = arg.strip_prefix("--urgency=") {
            args.urgency = Some(val.parse()?);
        } else if arg == "--action" {
            let val = iter
                .next()
                .ok_or_else(|| anyhow!("--action requires a value"))?;
            args.actions.push(parse_action(&val)?);
        } else if let Some(val) = arg.strip_prefix("--action=") {
            args.actions.push(parse_action(val)?);
        } else if arg == "--arrow" {
            let val = iter
                .next()
                .ok_or_else(|| anyhow!("--arrow requires a value"))?;
            args.arrow = Some(parse_point(&val)?);
        } else if let Some(val) = arg.strip_prefix("--arrow=") {
            args.arrow = Some(parse_point(val)?);
        } else if arg == "--stdin" {
            args.stdin = true;
        } else if arg == "--help" || arg == "-h" {
            return Err(anyhow!(USAGE));
        } else {
            rest.push(arg);
        }
    }

    if let Some((summary, body)) = rest.split_first() {
        args.message = Some((summary.clone(), body.join(" ")));
    }
    Ok(args)
}

fn parse_action(value: &str) -> Result<(String, String)> {
    let (key, label) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("--action expects key=label, got {value:?}"))?;
    Ok((key.to_string(), label.to_string()))
}

fn parse_point(value: &str) -> Result<Point> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| anyhow!("--arrow expects x,y, got {value:?}"))?;
    Ok(Point::new(x.trim().parse()?, y.trim().parse()?))
}
