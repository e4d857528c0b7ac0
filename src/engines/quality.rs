//! Confidence estimate for engines that do not report one.
//!
//! Garbled recognition output has telltale signs: symbol soup, runs of one
//! repeated glyph, and many one-letter "words". Each sign yields a factor in
//! 0.0-1.0 and the estimate is their weighted sum.

#[derive(Debug, Default)]
struct TextStats {
    chars: usize,
    letters: usize,
    digits: usize,
    symbols: usize,
    whitespace: usize,
    longest_run: usize,
    words: usize,
    single_letter_words: usize,
    word_chars: usize,
}

impl TextStats {
    fn collect(text: &str) -> Self {
        let mut stats = Self::default();
        let mut run = 0;
        let mut prev = None;

        for c in text.chars() {
            stats.chars += 1;
            if c.is_alphabetic() {
                stats.letters += 1;
            } else if c.is_numeric() {
                stats.digits += 1;
            } else if c.is_whitespace() {
                stats.whitespace += 1;
            } else if !c.is_ascii_punctuation() {
                stats.symbols += 1;
            }

            run = if prev == Some(c) && !c.is_whitespace() { run + 1 } else { 1 };
            stats.longest_run = stats.longest_run.max(run);
            prev = Some(c);
        }

        for word in text.split_whitespace() {
            let len = word.chars().count();
            stats.words += 1;
            stats.word_chars += len;
            if len == 1 {
                stats.single_letter_words += 1;
            }
        }

        stats
    }

    /// Letters and digits dominate, unknown symbols are rare
    fn alphabet_factor(&self) -> f32 {
        let total = self.chars as f32;
        let readable = (self.letters + self.digits) as f32 / total;
        let symbol_penalty = (self.symbols as f32 / total * 10.0).min(1.0);
        (readable * 1.4).min(1.0) * 0.5 + (1.0 - symbol_penalty) * 0.5
    }

    /// Average word length between 3 and 9, few single-letter fragments
    fn word_factor(&self) -> f32 {
        if self.words == 0 {
            return 0.5;
        }
        let average = self.word_chars as f32 / self.words as f32;
        let shape = if (3.0..=9.0).contains(&average) {
            1.0
        } else if (2.0..=12.0).contains(&average) {
            0.7
        } else {
            0.35
        };
        let fragments = self.single_letter_words as f32 / self.words as f32;
        shape * (1.0 - (fragments * 1.5).min(0.5))
    }

    /// Regular spacing, roughly one blank every 4-10 characters
    fn spacing_factor(&self) -> f32 {
        let ratio = self.whitespace as f32 / self.chars as f32;
        match ratio {
            r if (0.08..=0.28).contains(&r) => 1.0,
            r if (0.04..=0.40).contains(&r) => 0.7,
            _ => 0.4,
        }
    }

    fn repetition_factor(&self) -> f32 {
        match self.longest_run {
            0..=3 => 1.0,
            4..=5 => 0.8,
            6..=10 => 0.5,
            _ => 0.2,
        }
    }
}

/// Estimate a 0.0-1.0 confidence from recognized text alone
pub fn estimate_confidence(text: &str) -> f32 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    if text.chars().count() < 5 {
        return 0.5;
    }

    let stats = TextStats::collect(text);
    let score = 0.40 * stats.alphabet_factor()
        + 0.30 * stats.word_factor()
        + 0.15 * stats.spacing_factor()
        + 0.15 * stats.repetition_factor();

    score.clamp(0.0, 1.0)
}
