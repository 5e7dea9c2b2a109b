//! Terminal keyboard input, forwarded to the scheduler through a ring buffer

use std::{
    io::{stdout, Write},
    thread::JoinHandle,
    time::Duration,
};

use color_eyre::eyre::Result as EyreResult;
use crossterm::{
    cursor::MoveToColumn,
    event::{
        self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute, queue,
    style::Print,
    terminal::{self, Clear, ClearType},
};
use rtrb::{Consumer, Producer, RingBuffer};

use keysynth::{
    sequencing::{Key, Note},
    synth::HostEvent,
};

pub const HELP: &str = "\
keys   z s x d c v g b h n j m ,   octave 3 (C .. C4)
       q 2 w 3 e r 5 t 6 y 7 u i   octave 4 (C .. C5)
F1-F5  play one oscillator     space  all notes off     esc  quit";

/// Events buffered between the input thread and the event loop.
const QUEUE_CAPACITY: usize = 256;

const LOWER_ROW: [char; 13] = ['z', 's', 'x', 'd', 'c', 'v', 'g', 'b', 'h', 'n', 'j', 'm', ','];
const UPPER_ROW: [char; 13] = ['q', '2', 'w', '3', 'e', 'r', '5', 't', '6', 'y', '7', 'u', 'i'];

fn key_for(c: char) -> Option<Key> {
    let (row, octave) = if let Some(i) = LOWER_ROW.iter().position(|&k| k == c) {
        (i, 3)
    } else {
        (UPPER_ROW.iter().position(|&k| k == c)?, 4)
    };
    Some(Key::new(Note::C, octave).transpose(row as i32))
}

enum Input {
    Event(HostEvent),
    Quit,
    Ignore,
}

fn translate(key: KeyEvent, reports_release: bool) -> Vec<Input> {
    let released = key.kind == KeyEventKind::Release;
    match key.code {
        KeyCode::Esc => vec![Input::Quit],
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => vec![Input::Quit],
        KeyCode::Char(' ') if !released => vec![Input::Event(HostEvent::AllNotesOff)],
        KeyCode::F(n @ 1..=5) if !released => vec![Input::Event(HostEvent::Preview {
            slot: n as usize - 1,
        })],
        KeyCode::Char(c) => match key_for(c.to_ascii_lowercase()) {
            Some(note) if released => vec![Input::Event(HostEvent::KeyUp(note))],
            // Without release reports every press is followed by an up; the
            // confirmation delay keeps held keys sounding through auto-repeat.
            Some(note) if !reports_release => vec![
                Input::Event(HostEvent::KeyDown(note)),
                Input::Event(HostEvent::KeyUp(note)),
            ],
            Some(note) => vec![Input::Event(HostEvent::KeyDown(note))],
            None => vec![Input::Ignore],
        },
        _ => vec![Input::Ignore],
    }
}

fn run(mut events: Producer<HostEvent>, reports_release: bool) -> EyreResult<()> {
    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        for input in translate(key, reports_release) {
            match input {
                Input::Quit => return Ok(()),
                Input::Event(event) => {
                    if events.push(event).is_err() {
                        tracing::warn!("input queue full, event dropped");
                    }
                }
                Input::Ignore => {}
            }
        }
    }
}

/// Put the terminal in raw mode and read keys on a background thread.
///
/// The thread ends on esc or ctrl-c and restores the terminal; the consumer
/// then reports itself abandoned.
pub fn spawn() -> EyreResult<(Consumer<HostEvent>, JoinHandle<EyreResult<()>>)> {
    let (producer, consumer) = RingBuffer::new(QUEUE_CAPACITY);

    terminal::enable_raw_mode()?;
    let reports_release = terminal::supports_keyboard_enhancement().unwrap_or(false);
    if reports_release {
        execute!(
            stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    } else {
        tracing::info!("terminal does not report key releases, using auto-release");
    }

    let handle = std::thread::spawn(move || {
        let result = run(producer, reports_release);
        if reports_release {
            let _ = execute!(stdout(), PopKeyboardEnhancementFlags);
        }
        let _ = terminal::disable_raw_mode();
        println!();
        result
    });
    Ok((consumer, handle))
}

/// Overwrite the status line.
pub fn print_status(status: &str) {
    let mut out = stdout();
    let _ = queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(status));
    let _ = out.flush();
}
