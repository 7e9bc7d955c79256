//! Lexer behavior over realistic input.

use tally::syntax::lexer::Lexer;
use tally::syntax::TokenKind;

fn tokenize(source: &str) -> (Vec<u8>, Vec<tally::syntax::Token>) {
    let mut bytes = source.as_bytes().to_vec();
    bytes.push(0);
    let tokens = Lexer::tokenize(&bytes);
    (bytes, tokens)
}

#[test]
fn test_transaction_token_sequence() {
    use TokenKind::*;
    let (_, tokens) = tokenize(
        "2025-04-22 * \"Buy coffee\"\n  Assets:Checking -100.10 USD\n  Expenses:Food",
    );
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            Date, Asterisk, String, Eol, Indent, Account, Minus, Number, Currency, Eol, Indent,
            Account, Eof,
        ]
    );
}

#[test]
fn test_spans_are_ordered_and_in_bounds() {
    let source = "2024-01-01 * \"x\" ; trailing comment\n  Assets:Cash 1.00 USD\n\n* org line\n";
    let (bytes, tokens) = tokenize(source);
    let mut cursor = 0;
    for token in &tokens {
        assert!(token.start >= cursor, "span overlap at {:?}", token);
        assert!(token.end <= bytes.len());
        cursor = token.end;
    }
    // Every non-structural token slices real text.
    for token in &tokens {
        if !matches!(token.kind, TokenKind::Eof) {
            assert_eq!(
                token.text(&bytes).len(),
                token.end - token.start,
                "lexeme mismatch for {:?}",
                token
            );
        }
    }
}

#[test]
fn test_token_positions_are_utf16_columns() {
    // The narration contains a surrogate-pair emoji followed by a currency.
    let (_, tokens) = tokenize("2024-01-01 * \"\u{1F600} ok\"\n  Assets:Cash 1 USD");
    let string = tokens
        .iter()
        .find(|t| t.kind == TokenKind::String)
        .unwrap();
    // "\u{1F600} ok" is 2 + 3 code units plus both quotes.
    assert_eq!(string.col_end - string.col_start, 7);
}

#[test]
fn test_multiline_string_positions() {
    let (_, tokens) = tokenize("\"first\nsecond\" USD");
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].line, 0);
    assert_eq!(tokens[0].end_line, 1);
    assert_eq!(tokens[1].kind, TokenKind::Currency);
    assert_eq!(tokens[1].line, 1);
}

#[test]
fn test_flag_letter_lines_are_comments() {
    // Column-zero P/S/T/C/U/R/M lines are skipped wholesale, even when they
    // look like real content.
    let (_, tokens) = tokenize("P 2024-01-01 price line\n2024-01-02 open Assets:Cash\n");
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Eol,
            TokenKind::Date,
            TokenKind::Open,
            TokenKind::Account,
            TokenKind::Eol,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_keys_allow_interior_uppercase_and_digits() {
    let (_, tokens) = tokenize("  myKey2: \"v\"");
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Indent,
            TokenKind::Key,
            TokenKind::Colon,
            TokenKind::String,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_date_mode_is_greedy_but_validated_later() {
    // The lexer happily consumes malformed date-ish runs; the parser
    // rejects them with invalid_date.
    let (bytes, tokens) = tokenize("2024-13-99 1999/1/1");
    assert_eq!(tokens[0].kind, TokenKind::Date);
    assert_eq!(tokens[0].text(&bytes), "2024-13-99");
    assert_eq!(tokens[1].kind, TokenKind::Date);
}

#[test]
fn test_currency_boundary_lengths() {
    // 24 bytes is the longest accepted currency.
    let (_, tokens) = tokenize("ABCDEFGHIJKLMNOPQRSTUVWX");
    assert_eq!(tokens[0].kind, TokenKind::Currency);
}

#[test]
fn test_invalid_tokens_never_abort() {
    let (_, tokens) = tokenize("~~ §§§ 2024-01-01 open Assets:Cash");
    assert!(tokens.iter().any(|t| t.kind == TokenKind::Invalid));
    assert!(tokens.iter().any(|t| t.kind == TokenKind::Account));
    assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
}
