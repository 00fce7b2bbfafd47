use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use eframe::egui;
use serial_tester::{
    Tester,
    config::{ButtonAction, ButtonDef, TesterConfig},
    display::Scrollback,
    error::{TesterError, TesterResult},
    events::{MessageKind, TesterEvent},
    status::{CommandStatus, StatusBoard},
};
use tracing::{debug, info, warn};

use crate::options::ConnectionOptions;

const WINDOW_TITLE: &str = "Serial Port Tester";
const REPAINT_INTERVAL: Duration = Duration::from_millis(100);
const BUTTON_SIZE: [f32; 2] = [160.0, 24.0];

pub(crate) fn run(opts: ConnectionOptions) -> TesterResult<()> {
    let config = opts.load_config()?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 640.0])
            .with_min_inner_size([640.0, 400.0])
            .with_title(WINDOW_TITLE),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        native_options,
        Box::new(move |cc| Ok(Box::new(TesterApp::new(cc, config)))),
    )
    .map_err(|e| TesterError::Gui(e.to_string()))
}

struct TesterApp {
    tester: Tester,
    events: Receiver<TesterEvent>,
    scrollback: Scrollback,
    statuses: StatusBoard,
    buttons: Vec<ButtonDef>,
}

impl TesterApp {
    fn new(_cc: &eframe::CreationContext<'_>, config: TesterConfig) -> Self {
        let (tx, rx) = mpsc::channel();

        let buttons = config.buttons.clone();
        let mut statuses = StatusBoard::new();
        for button in buttons.iter().filter(|b| b.is_command()) {
            statuses.register(&button.command);
        }

        let mut tester = Tester::new(config, tx);
        // Failure is already on the scrollback; keep running disconnected
        if let Err(e) = tester.connect() {
            warn!("Starting disconnected: {}", e);
        }

        info!("Tester window ready with {} buttons", buttons.len());
        TesterApp {
            tester,
            events: rx,
            scrollback: Scrollback::new(),
            statuses,
            buttons,
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.scrollback.apply(&event);
            self.statuses.apply(&event);
        }
    }

    fn press(&mut self, index: usize) {
        let Some(button) = self.buttons.get(index) else {
            return;
        };

        match button.action() {
            ButtonAction::ClearDisplay => self.scrollback.clear(),
            ButtonAction::Send { command, expected } => {
                if let Err(e) = self.tester.send(command, expected.map(str::to_string)) {
                    debug!("Send of {:?} failed: {}", command, e);
                }
            }
        }
    }

    /// Lay out buttons on their configured grid, each status label one column to the right
    fn draw_buttons(&self, ui: &mut egui::Ui) -> Option<usize> {
        let Some(max_row) = self.buttons.iter().map(|b| b.row).max() else {
            ui.label("No buttons configured.");
            return None;
        };
        let max_column = self
            .buttons
            .iter()
            .map(|b| b.column + 1)
            .max()
            .unwrap_or(0);

        let mut pressed = None;
        egui::Grid::new("button_grid")
            .num_columns(max_column + 1)
            .spacing([8.0, 8.0])
            .show(ui, |ui| {
                for row in 0..=max_row {
                    for column in 0..=max_column {
                        let at_cell = self
                            .buttons
                            .iter()
                            .position(|b| b.row == row && b.column == column);
                        let status_owner = self.buttons.iter().find(|b| {
                            b.row == row && b.column + 1 == column && b.is_command()
                        });

                        if let Some(index) = at_cell {
                            let button = egui::Button::new(self.buttons[index].text.as_str());
                            if ui.add_sized(BUTTON_SIZE, button).clicked() {
                                pressed = Some(index);
                            }
                        } else if let Some(owner) = status_owner {
                            let status = self.statuses.get(&owner.command).unwrap_or_default();
                            ui.label(status_text(status));
                        } else {
                            ui.label("");
                        }
                    }
                    ui.end_row();
                }
            });

        pressed
    }

    fn draw_scrollback(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in self.scrollback.lines() {
                    let text = egui::RichText::new(line.text.as_str()).monospace();
                    let text = match message_color(line.kind) {
                        Some(color) => text.color(color),
                        None => text,
                    };
                    ui.label(text);
                }
            });
    }

    fn connection_text(&self) -> egui::RichText {
        if self.tester.is_connected() {
            egui::RichText::new(format!("ONLINE  {}", self.tester.config().serial.port))
                .color(egui::Color32::GREEN)
                .strong()
        } else {
            egui::RichText::new("OFFLINE")
                .color(egui::Color32::RED)
                .strong()
        }
    }
}

fn status_text(status: CommandStatus) -> egui::RichText {
    let [r, g, b] = status.rgb();
    egui::RichText::new(status.label())
        .color(egui::Color32::from_rgb(r, g, b))
        .strong()
}

fn message_color(kind: MessageKind) -> Option<egui::Color32> {
    match kind {
        MessageKind::Info => None,
        MessageKind::Success => Some(egui::Color32::GREEN),
        MessageKind::Error => Some(egui::Color32::RED),
    }
}

impl eframe::App for TesterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        let mut pressed = None;
        egui::SidePanel::left("command_panel")
            .resizable(true)
            .show(ctx, |ui| {
                ui.heading("Commands");
                ui.label(self.connection_text());
                ui.separator();
                egui::ScrollArea::vertical()
                    .id_salt("command_scroll")
                    .show(ui, |ui| {
                        pressed = self.draw_buttons(ui);
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_scrollback(ui);
        });

        if let Some(index) = pressed {
            self.press(index);
        }

        // Reader output arrives without user input
        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}
