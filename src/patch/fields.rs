//! Named parameter access for presets and host events.
//!
//! Every component exposes a table of `(name, getter, setter)` entries. Paths
//! address a table entry inside the patch:
//!
//! ```text
//! oscillator.2.amplitude     envelope.1.attack     tremolo.depth
//! echo.enabled               arpeggio.mode         output.to_speaker
//! ```
//!
//! Slot and envelope numbers in paths are 1-based, matching what a player
//! sees. Values are plain strings in both directions so a preset store can
//! persist them without knowing the model.

use std::str::FromStr;

use crate::{
    dsp::Waveform,
    error::{Result, SynthError},
    patch::{
        format_harmonics, parse_harmonics, ArpeggioConfig, EchoConfig, EnvelopeConfig,
        OscillatorSpec, Patch, SourceRef, TremoloConfig,
    },
    sequencing::chord::ChordMode,
};

/// One named, string-typed parameter of `T`.
pub struct Field<T: 'static> {
    pub name: &'static str,
    pub get: fn(&T) -> String,
    pub set: fn(&mut T, &str) -> Result<()>,
}

fn parse<V: FromStr>(name: &str, value: &str) -> Result<V> {
    value
        .trim()
        .parse()
        .map_err(|_| SynthError::invalid(name, value))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SynthError::invalid(name, value)),
    }
}

fn parse_optional<V: FromStr>(name: &str, value: &str) -> Result<Option<V>> {
    match value.trim() {
        "" | "none" | "<none>" => Ok(None),
        other => parse(name, other).map(Some),
    }
}

fn show_optional<V: ToString>(value: Option<V>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

pub const OSCILLATOR_FIELDS: &[Field<OscillatorSpec>] = &[
    Field {
        name: "waveform",
        get: |o| o.waveform.to_string(),
        set: |o, v| {
            o.set_waveform(parse::<Waveform>("waveform", v)?);
            Ok(())
        },
    },
    Field {
        name: "frequency",
        get: |o| show_optional(o.frequency),
        set: |o, v| {
            o.frequency = parse_optional("frequency", v)?;
            Ok(())
        },
    },
    Field {
        name: "amplitude",
        get: |o| o.amplitude.to_string(),
        set: |o, v| {
            o.amplitude = parse("amplitude", v)?;
            Ok(())
        },
    },
    Field {
        name: "phase",
        get: |o| o.phase.to_string(),
        set: |o, v| {
            o.phase = parse("phase", v)?;
            Ok(())
        },
    },
    Field {
        name: "bias",
        get: |o| o.bias.to_string(),
        set: |o, v| {
            o.bias = parse("bias", v)?;
            Ok(())
        },
    },
    Field {
        name: "pulse_width",
        get: |o| show_optional(o.pulse_width),
        set: |o, v| {
            o.pulse_width = parse_optional("pulse_width", v)?;
            Ok(())
        },
    },
    Field {
        name: "harmonics",
        get: |o| format_harmonics(&o.harmonics),
        set: |o, v| {
            o.harmonics = parse_harmonics(v)?;
            Ok(())
        },
    },
    Field {
        name: "ramp_start",
        get: |o| o.ramp.start.to_string(),
        set: |o, v| {
            o.ramp.start = parse("ramp_start", v)?;
            Ok(())
        },
    },
    Field {
        name: "ramp_increment",
        get: |o| o.ramp.increment.to_string(),
        set: |o, v| {
            o.ramp.increment = parse("ramp_increment", v)?;
            Ok(())
        },
    },
    Field {
        name: "ramp_min",
        get: |o| o.ramp.min.to_string(),
        set: |o, v| {
            o.ramp.min = parse("ramp_min", v)?;
            Ok(())
        },
    },
    Field {
        name: "ramp_max",
        get: |o| o.ramp.max.to_string(),
        set: |o, v| {
            o.ramp.max = parse("ramp_max", v)?;
            Ok(())
        },
    },
    Field {
        name: "fm",
        get: |o| o.fm.to_string(),
        set: |o, v| {
            o.fm = parse::<SourceRef>("fm", v)?;
            Ok(())
        },
    },
    Field {
        name: "pwm",
        get: |o| o.pwm.to_string(),
        set: |o, v| {
            o.pwm = parse::<SourceRef>("pwm", v)?;
            Ok(())
        },
    },
    Field {
        name: "follow_keys",
        get: |o| o.follow_keys.to_string(),
        set: |o, v| {
            o.follow_keys = parse_bool("follow_keys", v)?;
            Ok(())
        },
    },
    Field {
        name: "key_ratio",
        get: |o| o.key_ratio.to_string(),
        set: |o, v| {
            o.key_ratio = parse("key_ratio", v)?;
            Ok(())
        },
    },
];

pub const ENVELOPE_FIELDS: &[Field<EnvelopeConfig>] = &[
    Field {
        name: "source",
        get: |e| SourceRef::from(e.source).to_string(),
        set: |e, v| {
            e.source = parse::<SourceRef>("source", v)?.slot();
            Ok(())
        },
    },
    Field {
        name: "attack",
        get: |e| e.attack.to_string(),
        set: |e, v| {
            e.attack = parse("attack", v)?;
            Ok(())
        },
    },
    Field {
        name: "decay",
        get: |e| e.decay.to_string(),
        set: |e, v| {
            e.decay = parse("decay", v)?;
            Ok(())
        },
    },
    Field {
        name: "sustain",
        get: |e| e.sustain.to_string(),
        set: |e, v| {
            e.sustain = parse("sustain", v)?;
            Ok(())
        },
    },
    Field {
        name: "sustain_level",
        get: |e| e.sustain_level.to_string(),
        set: |e, v| {
            e.sustain_level = parse("sustain_level", v)?;
            Ok(())
        },
    },
    Field {
        name: "release",
        get: |e| e.release.to_string(),
        set: |e, v| {
            e.release = parse("release", v)?;
            Ok(())
        },
    },
    Field {
        name: "stop_at_end",
        get: |e| e.stop_at_end.to_string(),
        set: |e, v| {
            e.stop_at_end = parse_bool("stop_at_end", v)?;
            Ok(())
        },
    },
];

pub const TREMOLO_FIELDS: &[Field<TremoloConfig>] = &[
    Field {
        name: "waveform",
        get: |t| t.waveform.name().to_string(),
        set: |t, v| {
            t.waveform = v.trim().parse()?;
            Ok(())
        },
    },
    Field {
        name: "rate",
        get: |t| t.rate.to_string(),
        set: |t, v| {
            t.rate = parse("rate", v)?;
            Ok(())
        },
    },
    Field {
        name: "depth",
        get: |t| t.depth.to_string(),
        set: |t, v| {
            t.depth = parse("depth", v)?;
            Ok(())
        },
    },
];

pub const ECHO_FIELDS: &[Field<EchoConfig>] = &[
    Field {
        name: "enabled",
        get: |e| e.enabled.to_string(),
        set: |e, v| {
            e.enabled = parse_bool("enabled", v)?;
            Ok(())
        },
    },
    Field {
        name: "after",
        get: |e| e.after.to_string(),
        set: |e, v| {
            e.after = parse("after", v)?;
            Ok(())
        },
    },
    Field {
        name: "amount",
        get: |e| e.amount.to_string(),
        set: |e, v| {
            e.amount = parse("amount", v)?;
            Ok(())
        },
    },
    Field {
        name: "delay",
        get: |e| e.delay.to_string(),
        set: |e, v| {
            e.delay = parse("delay", v)?;
            Ok(())
        },
    },
    Field {
        name: "decay",
        get: |e| e.decay.to_string(),
        set: |e, v| {
            e.decay = parse("decay", v)?;
            Ok(())
        },
    },
];

pub const ARPEGGIO_FIELDS: &[Field<ArpeggioConfig>] = &[
    Field {
        name: "mode",
        get: |a| a.mode.to_string(),
        set: |a, v| {
            a.mode = parse::<ChordMode>("mode", v)?;
            Ok(())
        },
    },
    Field {
        name: "rate",
        get: |a| a.rate.to_string(),
        set: |a, v| {
            let rate: f32 = parse("rate", v)?;
            if !(rate > 0.0 && rate.is_finite()) {
                return Err(SynthError::invalid("rate", v));
            }
            a.rate = rate;
            Ok(())
        },
    },
    Field {
        name: "ratio",
        get: |a| a.ratio.to_string(),
        set: |a, v| {
            let ratio: u32 = parse("ratio", v)?;
            if !(1..=100).contains(&ratio) {
                return Err(SynthError::invalid("ratio", v));
            }
            a.ratio = ratio;
            Ok(())
        },
    },
];

fn lookup<T: 'static>(table: &'static [Field<T>], name: &str, path: &str) -> Result<&'static Field<T>> {
    table
        .iter()
        .find(|field| field.name == name)
        .ok_or_else(|| SynthError::UnknownParam(path.to_string()))
}

fn get_in<T: 'static>(table: &'static [Field<T>], target: &T, name: &str, path: &str) -> Result<String> {
    Ok((lookup(table, name, path)?.get)(target))
}

fn set_in<T: 'static>(
    table: &'static [Field<T>],
    target: &mut T,
    name: &str,
    path: &str,
    value: &str,
) -> Result<()> {
    (lookup(table, name, path)?.set)(target, value).map_err(|err| match err {
        // Report the full path rather than the bare field name.
        SynthError::InvalidValue { value, .. } => SynthError::InvalidValue {
            path: path.to_string(),
            value,
        },
        other => other,
    })
}

fn dump<T: 'static>(table: &'static [Field<T>], target: &T, prefix: &str, out: &mut Vec<(String, String)>) {
    for field in table {
        out.push((format!("{prefix}.{}", field.name), (field.get)(target)));
    }
}

fn parse_slots(path: &str, value: &str) -> Result<Vec<usize>> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<SourceRef>() {
            Ok(SourceRef::Osc(slot)) => Ok(slot),
            _ => Err(SynthError::invalid(path, value)),
        })
        .collect()
}

fn format_slots(slots: &[usize]) -> String {
    slots
        .iter()
        .map(|slot| (slot + 1).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// A parsed parameter path.
enum Target<'a> {
    Oscillator(usize, &'a str),
    Envelope(usize, &'a str),
    Tremolo(&'a str),
    Echo(&'a str),
    Arpeggio(&'a str),
    ToSpeaker,
}

fn resolve(path: &str) -> Result<Target<'_>> {
    let unknown = || SynthError::UnknownParam(path.to_string());
    let parts: Vec<&str> = path.split('.').collect();
    let index = |n: &str| -> Result<usize> {
        match n.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n - 1),
            _ => Err(unknown()),
        }
    };

    match parts.as_slice() {
        ["oscillator", n, field] => Ok(Target::Oscillator(index(n)?, field)),
        ["envelope", n, field] => Ok(Target::Envelope(index(n)?, field)),
        ["tremolo", field] => Ok(Target::Tremolo(field)),
        ["echo", field] => Ok(Target::Echo(field)),
        ["arpeggio", field] => Ok(Target::Arpeggio(field)),
        ["output", "to_speaker"] => Ok(Target::ToSpeaker),
        _ => Err(unknown()),
    }
}

impl Patch {
    /// Read one parameter as text.
    pub fn get_param(&self, path: &str) -> Result<String> {
        let unknown = || SynthError::UnknownParam(path.to_string());
        match resolve(path)? {
            Target::Oscillator(slot, name) => {
                let osc = self.oscillators.get(slot).ok_or_else(unknown)?;
                get_in(OSCILLATOR_FIELDS, osc, name, path)
            }
            Target::Envelope(n, name) => {
                let env = self.envelopes.get(n).ok_or_else(unknown)?;
                get_in(ENVELOPE_FIELDS, env, name, path)
            }
            Target::Tremolo(name) => get_in(TREMOLO_FIELDS, &self.tremolo, name, path),
            Target::Echo(name) => get_in(ECHO_FIELDS, &self.echo, name, path),
            Target::Arpeggio(name) => get_in(ARPEGGIO_FIELDS, &self.arpeggio, name, path),
            Target::ToSpeaker => Ok(format_slots(&self.to_speaker)),
        }
    }

    /// Assign one parameter from text. The patch is untouched on error.
    pub fn set_param(&mut self, path: &str, value: &str) -> Result<()> {
        let unknown = || SynthError::UnknownParam(path.to_string());
        match resolve(path)? {
            Target::Oscillator(slot, name) => {
                let osc = self.oscillators.get_mut(slot).ok_or_else(unknown)?;
                set_in(OSCILLATOR_FIELDS, osc, name, path, value)
            }
            Target::Envelope(n, name) => {
                let slots = self.oscillators.len();
                let env = self.envelopes.get_mut(n).ok_or_else(unknown)?;
                let previous = env.source;
                set_in(ENVELOPE_FIELDS, env, name, path, value)?;
                if env.source.is_some_and(|slot| slot >= slots) {
                    env.source = previous;
                    return Err(SynthError::invalid(path, value));
                }
                Ok(())
            }
            Target::Tremolo(name) => set_in(TREMOLO_FIELDS, &mut self.tremolo, name, path, value),
            Target::Echo(name) => set_in(ECHO_FIELDS, &mut self.echo, name, path, value),
            Target::Arpeggio(name) => {
                set_in(ARPEGGIO_FIELDS, &mut self.arpeggio, name, path, value)
            }
            Target::ToSpeaker => {
                let slots = parse_slots(path, value)?;
                if slots.iter().any(|&slot| slot >= self.oscillators.len()) {
                    return Err(SynthError::invalid(path, value));
                }
                self.to_speaker = slots;
                Ok(())
            }
        }
    }

    /// Every parameter path with its current value, in a stable order.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (n, osc) in self.oscillators.iter().enumerate() {
            dump(OSCILLATOR_FIELDS, osc, &format!("oscillator.{}", n + 1), &mut out);
        }
        for (n, env) in self.envelopes.iter().enumerate() {
            dump(ENVELOPE_FIELDS, env, &format!("envelope.{}", n + 1), &mut out);
        }
        dump(TREMOLO_FIELDS, &self.tremolo, "tremolo", &mut out);
        dump(ECHO_FIELDS, &self.echo, "echo", &mut out);
        dump(ARPEGGIO_FIELDS, &self.arpeggio, "arpeggio", &mut out);
        out.push(("output.to_speaker".to_string(), format_slots(&self.to_speaker)));
        out
    }
}
