use std::ops::RangeInclusive;
use std::thread;
use std::time::Duration;

use iced::canvas::{Cursor, Frame, Geometry, Program};
use iced::{
    executor, slider, Application, Canvas, Color, Column, Command, Element, Length, Point,
    Rectangle, Row, Settings, Size, Slider, Subscription, Text,
};
use ising_metropolis::render::Palette;
use ising_metropolis::{logging, FrameSlot, ParameterHandle, SimulationConfig, Snapshot, StopSignal};
use structopt::StructOpt;

const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.01..=100.0;
const FIELD_RANGE: RangeInclusive<f64> = 0.0..=100.0;
const REFRESH: Duration = Duration::from_millis(30);

fn main() -> anyhow::Result<()> {
    let config = SimulationConfig::from_args();
    logging::init(config.verbose);
    config.validate()?;

    let mut sampler = config.build_sampler();
    let parameters = sampler.parameters();
    let first = sampler.snapshot();
    let frames = FrameSlot::new();

    let limit = config.limit();
    let mut publisher = frames.clone();
    thread::Builder::new()
        .name("sampler".to_owned())
        .spawn(move || {
            sampler.run(&mut publisher, limit, &StopSignal::new());
        })?;

    MainApp::run(Settings {
        antialiasing: false,
        ..Settings::with_flags(AppFlags {
            parameters,
            frames,
            first,
        })
    })?;
    Ok(())
}

pub struct AppFlags {
    parameters: ParameterHandle,
    frames: FrameSlot,
    first: Snapshot,
}

#[derive(Debug, Clone)]
pub enum AppMessage {
    Tick,
    TemperatureChanged(f64),
    FieldChanged(f64),
}

pub struct MainApp {
    parameters: ParameterHandle,
    frames: FrameSlot,
    snapshot: Snapshot,
    palette: Palette,
    temperature: f64,
    field: f64,
    temperature_slider: slider::State,
    field_slider: slider::State,
}

impl Application for MainApp {
    type Executor = executor::Default;
    type Message = AppMessage;
    type Flags = AppFlags;

    fn new(flags: AppFlags) -> (Self, Command<AppMessage>) {
        let app = Self {
            temperature: flags.parameters.temperature(),
            field: flags.parameters.magnetic_field(),
            parameters: flags.parameters,
            frames: flags.frames,
            snapshot: flags.first,
            palette: Palette::default(),
            temperature_slider: slider::State::new(),
            field_slider: slider::State::new(),
        };
        (app, Command::none())
    }

    fn title(&self) -> String {
        "Ising Model".to_owned()
    }

    fn update(&mut self, message: AppMessage) -> Command<AppMessage> {
        match message {
            AppMessage::Tick => {
                if let Some(snapshot) = self.frames.take() {
                    self.snapshot = snapshot;
                }
            }
            AppMessage::TemperatureChanged(temperature) => {
                self.temperature = temperature;
                self.parameters.set_temperature(temperature);
            }
            AppMessage::FieldChanged(field) => {
                self.field = field;
                self.parameters.set_magnetic_field(field);
            }
        }
        Command::none()
    }

    fn subscription(&self) -> Subscription<AppMessage> {
        iced::time::every(REFRESH).map(|_| AppMessage::Tick)
    }

    fn view(&mut self) -> Element<AppMessage> {
        let lattice = Canvas::new(LatticeView {
            snapshot: &self.snapshot,
            palette: self.palette,
        })
        .width(Length::Fill)
        .height(Length::Fill);

        let controls = Column::new()
            .spacing(10)
            .padding(20)
            .width(Length::Units(300))
            .push(Text::new(format!("Temperature: {:.2}", self.temperature)))
            .push(
                Slider::new(
                    &mut self.temperature_slider,
                    TEMPERATURE_RANGE,
                    self.temperature,
                    AppMessage::TemperatureChanged,
                )
                .step(0.01),
            )
            .push(Text::new(format!("Magnetic Field: {:.2}", self.field)))
            .push(
                Slider::new(
                    &mut self.field_slider,
                    FIELD_RANGE,
                    self.field,
                    AppMessage::FieldChanged,
                )
                .step(0.01),
            )
            .push(Text::new(format!("Step: {}", self.snapshot.iteration())));

        Row::new()
            .push(lattice)
            .push(controls)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

pub struct LatticeView<'a> {
    snapshot: &'a Snapshot,
    palette: Palette,
}

fn color([r, g, b]: [u8; 3]) -> Color {
    Color::from_rgb8(r, g, b)
}

impl<'a> Program<AppMessage> for LatticeView<'a> {
    fn draw(&self, bounds: Rectangle, _cursor: Cursor) -> Vec<Geometry> {
        let mut frame = Frame::new(bounds.size());

        let rows = self.snapshot.width() as f32;
        let cols = self.snapshot.height() as f32;
        let cell = (bounds.width / cols).min(bounds.height / rows);
        let origin = Point::new(
            (bounds.width - cell * cols) / 2.,
            (bounds.height - cell * rows) / 2.,
        );

        frame.fill_rectangle(
            origin,
            Size::new(cell * cols, cell * rows),
            color(self.palette.down),
        );

        let up = color(self.palette.up);
        for (i, row) in self.snapshot.grid().rows().enumerate() {
            for (j, spin) in row.enumerate() {
                if spin.is_up() {
                    frame.fill_rectangle(
                        Point::new(origin.x + j as f32 * cell, origin.y + i as f32 * cell),
                        Size::new(cell, cell),
                        up,
                    );
                }
            }
        }

        vec![frame.into_geometry()]
    }
}
