use rand::seq::SliceRandom;

use crate::settings::{Locale, ToneLevel};

/// Picks the text shown in reminders. Implementations must never return an empty body.
pub trait MessageSelector: Send + Sync {
    fn title(&self, locale: Locale) -> String;

    fn body(&self, locale: Locale, tone: ToneLevel) -> String;
}

const EN: [[&str; 2]; 4] = [
    ["You got this. One small win today.", "Keep it simple: show up."],
    ["Again? Let's not pretend you forgot.", "Be honest: do it now."],
    ["Discipline beats motivation. Move.", "You said you wanted it. Prove it."],
    ["You can scroll later. Earn it first.", "Stop negotiating with yourself."],
];

const ES: [[&str; 2]; 4] = [
    ["Tú puedes. Una pequeña victoria hoy.", "Simple: preséntate y hazlo."],
    ["¿Otra vez? No finjamos que se te olvidó.", "Sé honesto: hazlo ya."],
    [
        "La disciplina le gana a la motivación. Muévete.",
        "Dijiste que lo querías. Demuéstralo.",
    ],
    ["El scroll puede esperar. Gánatelo primero.", "Deja de negociar contigo."],
];

const AR: [[&str; 2]; 4] = [
    ["أنت قادر. فوز صغير اليوم.", "ببساطة: ابدأ."],
    ["مرة أخرى؟ لا تتظاهر أنك نسيت.", "كن صريحًا: افعلها الآن."],
    ["الانضباط أقوى من الحماس. تحرك.", "قلت أنك تريده. أثبت ذلك."],
    ["التصفح لاحقًا. استحقه أولاً.", "توقف عن المساومة مع نفسك."],
];

/// Built-in table: two lines per locale and tone, chosen at random.
#[derive(Debug, Default, Clone, Copy)]
pub struct ToneMessages;

impl ToneMessages {
    pub fn candidates(locale: Locale, tone: ToneLevel) -> &'static [&'static str] {
        let table = match locale {
            Locale::En => &EN,
            Locale::Es => &ES,
            Locale::Ar => &AR,
        };
        &table[usize::from(tone.level())]
    }
}

impl MessageSelector for ToneMessages {
    fn title(&self, locale: Locale) -> String {
        match locale {
            Locale::En => "Daily check-in",
            Locale::Es => "Revisión diaria",
            Locale::Ar => "المراجعة اليومية",
        }
        .to_string()
    }

    fn body(&self, locale: Locale, tone: ToneLevel) -> String {
        let candidates = Self::candidates(locale, tone);
        candidates
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(candidates[0])
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_locale_and_tone_has_text() {
        for locale in [Locale::En, Locale::Es, Locale::Ar] {
            assert!(!ToneMessages.title(locale).is_empty());
            for level in 0..=ToneLevel::MAX {
                let tone = ToneLevel::new(level).unwrap();
                let body = ToneMessages.body(locale, tone);
                assert!(ToneMessages::candidates(locale, tone).contains(&body.as_str()));
            }
        }
    }
}
