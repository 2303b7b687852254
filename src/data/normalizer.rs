// ============================================================
// Layer 4 — Text Normalizer
// ============================================================
// Cleans raw text before it reaches the embedder or tokenizer.
//
// Two entry points:
//
//   clean_basic          — whitespace/control cleanup only.
//                          Used for classification, where the
//                          embedder sees the text as a whole.
//
//   clean_for_generation — the full chain, then wraps the
//                          sentence in [CLS] … [END] so the
//                          next-word model learns where
//                          sentences start and stop:
//
//     1. ASCII emoticons → words     ":)"        → "smile"
//     2. emoji → words               "😂"        → "laugh"
//     3. character runs ≤ 2          "soooo"     → "soo"
//     4. punctuation split           "hi,you!"   → "hi , you !"
//     5. repeated words collapsed    "very very" → "very"
//     6. optional custom cleaning function
//     7. multiple spaces collapsed, edges trimmed
//
// Steps 1-2 run first because splitting punctuation would
// break ":)" into ": )" and hide it from the emoticon table.

pub const START_TOKEN: &str = "[CLS]";
pub const END_TOKEN:   &str = "[END]";

type CleaningFn = Box<dyn Fn(&str) -> String + Send + Sync>;

pub struct TextNormalizer {
    cleaning: Option<CleaningFn>,
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self { cleaning: None }
    }

    /// Run `f` after the built-in steps of `clean_for_generation`.
    pub fn with_cleaning<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.cleaning = Some(Box::new(f));
        self
    }

    /// Whitespace and control-character cleanup.
    pub fn clean_basic(&self, text: &str) -> String {
        let mapped: String = text
            .chars()
            .map(|c| match c {
                '\t' | '\r' | '\n' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            })
            .collect();
        self.remove_multiple_spaces(&mapped)
    }

    /// Full cleaning chain, wrapped in start/end markers.
    pub fn clean_for_generation(&self, text: &str) -> String {
        format!("{} {} {}", START_TOKEN, self.clean_body(text), END_TOKEN)
    }

    /// Same chain for a prompt: start marker only, the sentence is unfinished.
    pub fn clean_prefix(&self, text: &str) -> String {
        let body = self.clean_body(text);
        if body.is_empty() {
            START_TOKEN.to_string()
        } else {
            format!("{} {}", START_TOKEN, body)
        }
    }

    fn clean_body(&self, text: &str) -> String {
        let text = self.clean_basic(text);
        let text = self.text_demoticons(&text);
        let text = self.text_demojis(&text);
        let text = self.replace_char_rep(&text);
        let text = self.split_text_for_tokenizer(&text);
        let text = self.replace_words_rep(&text);
        let text = match &self.cleaning {
            Some(f) => f(&text),
            None => text,
        };
        self.remove_multiple_spaces(&text)
    }

    /// Put spaces around punctuation so whitespace tokenization separates it.
    /// Apostrophes and hyphens inside a word ("it's", "well-known") stay attached.
    pub fn split_text_for_tokenizer(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len() + text.len() / 4);

        for (i, &c) in chars.iter().enumerate() {
            let inside_word = matches!(c, '\'' | '\u{2019}' | '-')
                && i > 0
                && chars[i - 1].is_alphanumeric()
                && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());

            if is_split_punctuation(c) && !inside_word {
                out.push(' ');
                out.push(c);
                out.push(' ');
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Collapse runs of the same character longer than two.
    pub fn replace_char_rep(&self, text: &str) -> String {
        let mut out  = String::with_capacity(text.len());
        let mut prev = None;
        let mut run  = 0usize;

        for c in text.chars() {
            if Some(c) == prev {
                run += 1;
            } else {
                prev = Some(c);
                run  = 1;
            }
            if run <= 2 {
                out.push(c);
            }
        }
        out
    }

    /// Drop a word when it repeats the previous one (case-insensitive).
    pub fn replace_words_rep(&self, text: &str) -> String {
        let mut kept: Vec<&str> = Vec::new();
        for word in text.split_whitespace() {
            let repeated = kept
                .last()
                .is_some_and(|last| last.to_lowercase() == word.to_lowercase());
            if !repeated {
                kept.push(word);
            }
        }
        kept.join(" ")
    }

    /// Replace known emoji with a word, drop other pictographs.
    pub fn text_demojis(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if let Some(word) = emoji_word(c) {
                out.push(' ');
                out.push_str(word);
                out.push(' ');
            } else if !is_pictograph(c) {
                out.push(c);
            }
        }
        out
    }

    /// Replace whitespace-delimited ASCII emoticons with a word.
    pub fn text_demoticons(&self, text: &str) -> String {
        text.split_whitespace()
            .map(|token| emoticon_word(token).unwrap_or(token))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn remove_multiple_spaces(&self, text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_split_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '«' | '»' | '…' | '\u{201C}' | '\u{201D}' | '\u{2019}' | '¿' | '¡' | '–' | '—'
        )
}

fn emoji_word(c: char) -> Option<&'static str> {
    let word = match c {
        '😀' | '😃' | '😄' | '😁' | '🙂' | '😊' => "smile",
        '😂' | '🤣'                            => "laugh",
        '😢' | '😭' | '🙁' | '☹'               => "sad",
        '😍' | '❤' | '💕' | '💖'               => "love",
        '😡' | '😠'                            => "angry",
        '😉'                                   => "wink",
        '👍'                                   => "thumbs_up",
        '👎'                                   => "thumbs_down",
        _ => return None,
    };
    Some(word)
}

fn is_pictograph(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0xFE0F | 0x200D | 0x1F1E6..=0x1F1FF
    )
}

fn emoticon_word(token: &str) -> Option<&'static str> {
    let word = match token {
        ":)" | ":-)" | "=)" | ":]"   => "smile",
        ":D" | ":-D" | "xD" | "XD"   => "laugh",
        ":(" | ":-(" | ":["          => "sad",
        ":'("                        => "cry",
        ";)" | ";-)"                 => "wink",
        ":P" | ":p" | ":-P" | ":-p"  => "tongue",
        ":o" | ":O" | ":-o" | ":-O"  => "surprise",
        "<3"                         => "love",
        _ => return None,
    };
    Some(word)
}
