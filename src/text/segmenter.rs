//! Разбиение текста на фрагменты под лимит символов движка

/// Фрагмент текста единицы
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Номер части внутри единицы, с единицы
    pub part: usize,
    pub text: String,
}

/// Жадная упаковка слов: слова добавляются, пока длина фрагмента вместе с
/// пробелами не превышает `limit`. Слово длиннее лимита не режется и
/// становится отдельным фрагментом.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len == 0 {
            current.push_str(word);
            current_len = word_len;
            continue;
        }
        if current_len + 1 + word_len > limit {
            result.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        }
    }

    if !current.is_empty() {
        result.push(current);
    }
    result
}

/// То же, с нумерацией частей
pub fn segment(text: &str, limit: usize) -> Vec<TextChunk> {
    split_text(text, limit)
        .into_iter()
        .enumerate()
        .map(|(i, text)| TextChunk { part: i + 1, text })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packs_words_up_to_limit() {
        assert_eq!(split_text("aa bb cc dd", 5), vec!["aa bb", "cc dd"]);
        assert_eq!(split_text("aa bb cc", 8), vec!["aa bb cc"]);
        assert_eq!(split_text("aa bb cc", 7), vec!["aa bb", "cc"]);
    }

    #[test]
    fn test_oversized_word_is_own_chunk() {
        assert_eq!(
            split_text("tiny enormousword x", 5),
            vec!["tiny", "enormousword", "x"]
        );
        assert_eq!(split_text("enormousword", 3), vec!["enormousword"]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(split_text("", 10).is_empty());
        assert!(split_text("   \t ", 10).is_empty());
    }

    #[test]
    fn test_rejoin_reproduces_normalized_text() {
        let text = "Litwo!  Ojczyzno moja! ty jesteś jak zdrowie:\nIle cię trzeba cenić, ten tylko się dowie, kto cię stracił.";
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        for limit in [12, 20, 33, 1000] {
            let chunks = split_text(text, limit);
            assert!(chunks.iter().all(|c| c.chars().count() <= limit));
            assert_eq!(chunks.join(" "), normalized);
        }
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        // 5 znaków, 10 bajtów
        assert_eq!(split_text("ąęśćź ż", 7), vec!["ąęśćź ż"]);
    }

    #[test]
    fn test_segment_numbers_parts() {
        let chunks = segment("one two three", 7);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], TextChunk { part: 1, text: "one two".into() });
        assert_eq!(chunks[1].part, 2);
    }
}
