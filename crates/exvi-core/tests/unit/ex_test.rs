//! Ex command tests
//!
//! Source: src/ex.rs
//! Covers: every verb through the dispatcher, ranges, register `:`, failures

use super::{run, vi};
use exvi_core::{Cursor, RopeBuffer, Session, TextBuffer, Vi};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

const HELLO: &str = "hello0\nhello1\nhello2\nhello3\nhello4\nhello5\n";

fn ex(vi: &mut Vi<RopeBuffer>, session: &mut Session, line: &str) -> bool {
    vi.command(session, &format!(":{line}"))
}

fn lines(vi: &Vi<RopeBuffer>) -> Vec<String> {
    let buffer = vi.buffer();
    (0..buffer.line_count()).filter_map(|l| buffer.line(l)).collect()
}

// ==================== goto ====================

#[test]
fn test_goto_line() {
    let (mut vi, mut session) = vi(HELLO);
    assert!(ex(&mut vi, &mut session, "3"));
    assert_eq!(vi.caret(), Cursor::new(2, 0));
    assert!(ex(&mut vi, &mut session, "$"));
    assert_eq!(vi.caret().line, 5);
    run(&mut vi, &mut session, &["''"]);
    assert_eq!(vi.caret().line, 2);
    assert!(ex(&mut vi, &mut session, "0"));
    assert_eq!(vi.caret().line, 0);
    assert!(ex(&mut vi, &mut session, ""));
    assert!(!ex(&mut vi, &mut session, "'q"));
}

// ==================== delete / yank / put ====================

#[test]
fn test_delete_with_register_and_count() {
    let (mut vi, mut session) = vi(HELLO);
    assert!(ex(&mut vi, &mut session, "2,3d a"));
    assert_eq!(lines(&vi), ["hello0", "hello3", "hello4", "hello5"]);
    let a = session.registers.get('a').unwrap();
    assert_eq!(a.content, "hello1\nhello2\n");
    assert!(a.linewise);

    assert_eq!(vi.caret().line, 1);
    assert!(ex(&mut vi, &mut session, "d 2"));
    assert_eq!(lines(&vi), ["hello0", "hello5"]);
    assert!(!ex(&mut vi, &mut session, "d !"));
}

#[test]
fn test_yank_and_put() {
    let (mut vi, mut session) = vi(HELLO);
    assert!(ex(&mut vi, &mut session, "1,2y"));
    assert_eq!(vi.buffer().text(), HELLO);
    assert!(ex(&mut vi, &mut session, "$pu"));
    assert_eq!(vi.buffer().line_count(), 8);
    assert_eq!(vi.buffer().line(6).as_deref(), Some("hello0"));
    assert_eq!(vi.buffer().line(7).as_deref(), Some("hello1"));

    assert!(ex(&mut vi, &mut session, "3y b"));
    assert!(ex(&mut vi, &mut session, "0put b"));
    assert_eq!(vi.buffer().line(0).as_deref(), Some("hello2"));
    assert!(!ex(&mut vi, &mut session, "pu z"));
}

// ==================== join ====================

#[test]
fn test_join() {
    let (mut vi, mut session) = vi(HELLO);
    assert!(ex(&mut vi, &mut session, "1,3j"));
    assert_eq!(vi.buffer().line(0).as_deref(), Some("hello0 hello1 hello2"));
    assert!(ex(&mut vi, &mut session, "j"));
    assert_eq!(vi.buffer().line(0).as_deref(), Some("hello0 hello1 hello2 hello3"));
    assert!(ex(&mut vi, &mut session, "$"));
    assert!(!ex(&mut vi, &mut session, "j"));
}

// ==================== substitute ====================

#[test]
fn test_substitute_and_repeat() {
    let (mut vi, mut session) = vi("a a\na a\n");
    assert!(ex(&mut vi, &mut session, "1s/a/b/"));
    assert_eq!(lines(&vi), ["b a", "a a"]);
    assert!(ex(&mut vi, &mut session, "&"));
    assert_eq!(lines(&vi), ["b b", "a a"]);
    assert!(ex(&mut vi, &mut session, "2&"));
    assert_eq!(lines(&vi), ["b b", "b a"]);
    // normal-mode `&` repeats on the current line
    run(&mut vi, &mut session, &["&"]);
    assert_eq!(lines(&vi), ["b b", "b b"]);

    assert!(ex(&mut vi, &mut session, "%s/b/c/g"));
    assert_eq!(lines(&vi), ["c c", "c c"]);
    assert!(!ex(&mut vi, &mut session, "%s/x/y/"));
}

#[test]
fn test_substitute_follows_ignore_case() {
    let (mut vi, mut session) = vi("Hello\n");
    assert!(!ex(&mut vi, &mut session, "s/HELLO/bye/"));
    assert!(ex(&mut vi, &mut session, "set ic"));
    assert!(ex(&mut vi, &mut session, "s/HELLO/bye/"));
    assert_eq!(lines(&vi), ["bye"]);
}

#[test]
fn test_substitute_without_previous_fails() {
    let (mut vi, mut session) = vi("abc\n");
    assert!(!ex(&mut vi, &mut session, "&"));
    assert!(!ex(&mut vi, &mut session, "s"));
    assert!(!vi.command(&mut session, "&"));
}

// ==================== files ====================

#[test]
fn test_write_and_append() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let (mut vi, mut session) = vi(HELLO);

    assert!(ex(&mut vi, &mut session, &format!("2,3w {}", path.display())));
    assert_eq!(fs::read_to_string(&path).unwrap(), "hello1\nhello2\n");
    assert!(ex(&mut vi, &mut session, &format!("1w>> {}", path.display())));
    assert_eq!(fs::read_to_string(&path).unwrap(), "hello1\nhello2\nhello0\n");
}

#[test]
fn test_write_defaults_to_buffer_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    let mut buffer = RopeBuffer::from_text(HELLO);
    buffer.set_file_path(path.clone());
    let mut vi = Vi::new(buffer);
    let mut session = Session::new();

    assert!(ex(&mut vi, &mut session, "w"));
    assert_eq!(fs::read_to_string(&path).unwrap(), HELLO);

    let (mut unnamed, mut session) = super::vi(HELLO);
    assert!(!ex(&mut unnamed, &mut session, "w"));
}

#[test]
fn test_read_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("in.txt");
    fs::write(&path, "one\ntwo\n").unwrap();
    let (mut vi, mut session) = vi("a\nb\n");

    assert!(ex(&mut vi, &mut session, &format!("1r {}", path.display())));
    assert_eq!(lines(&vi), ["a", "one", "two", "b"]);
    assert!(ex(&mut vi, &mut session, &format!("0r {}", path.display())));
    assert_eq!(lines(&vi)[..2], ["one", "two"]);
    let missing = dir.path().join("missing.txt");
    assert!(!ex(&mut vi, &mut session, &format!("r {}", missing.display())));
}

// ==================== insert / append ====================

#[test]
fn test_insert_and_append_lines() {
    let (mut vi, mut session) = vi("a\nb\n");
    assert!(ex(&mut vi, &mut session, "2i middle"));
    assert!(ex(&mut vi, &mut session, "0a top"));
    assert!(ex(&mut vi, &mut session, "$a end"));
    assert_eq!(lines(&vi), ["top", "a", "middle", "b", "end"]);
    assert!(!ex(&mut vi, &mut session, "a"));
}

// ==================== markers / window ====================

#[test]
fn test_marks() {
    let (mut vi, mut session) = vi(HELLO);
    assert!(ex(&mut vi, &mut session, "3k a"));
    assert!(ex(&mut vi, &mut session, "4kb"));
    assert!(ex(&mut vi, &mut session, "5mark c"));
    run(&mut vi, &mut session, &["'a"]);
    assert_eq!(vi.caret().line, 2);
    run(&mut vi, &mut session, &["'c"]);
    assert_eq!(vi.caret().line, 4);
    assert!(ex(&mut vi, &mut session, "'a,'bd"));
    assert_eq!(lines(&vi), ["hello0", "hello1", "hello4", "hello5"]);
    assert!(!ex(&mut vi, &mut session, "k ab"));
}

#[test]
fn test_delete_marks() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &["ma", "j", "mb"]);
    assert!(!ex(&mut vi, &mut session, "delm a z"));
    assert!(vi.buffer().marker('a').is_some());
    assert!(ex(&mut vi, &mut session, "delm a b"));
    assert!(vi.buffer().marker('a').is_none());
    assert!(vi.buffer().marker('b').is_none());
    assert!(!ex(&mut vi, &mut session, "delmarks"));
}

#[test]
fn test_window() {
    let (mut vi, mut session) = vi(HELLO);
    assert!(ex(&mut vi, &mut session, "3z."));
    assert!(ex(&mut vi, &mut session, "z"));
    assert!(!ex(&mut vi, &mut session, "z*"));
    assert_eq!(vi.caret(), Cursor::new(0, 0));
}

// ==================== copy / move / shift ====================

#[test]
fn test_copy_and_move() {
    let (mut vi, mut session) = vi("a\nb\nc\n");
    assert!(ex(&mut vi, &mut session, "1,2co$"));
    assert_eq!(lines(&vi), ["a", "b", "c", "a", "b"]);
    assert!(ex(&mut vi, &mut session, "3t0"));
    assert_eq!(lines(&vi), ["c", "a", "b", "c", "a", "b"]);
    assert!(ex(&mut vi, &mut session, "1m$"));
    assert_eq!(lines(&vi), ["a", "b", "c", "a", "b", "c"]);
    assert!(!ex(&mut vi, &mut session, "1,3m2"));
    assert!(!ex(&mut vi, &mut session, "co"));
}

#[test]
fn test_shift() {
    let (mut vi, mut session) = vi("a\nb\nc\n");
    assert!(ex(&mut vi, &mut session, "1,2>"));
    assert_eq!(lines(&vi), ["    a", "    b", "c"]);
    assert!(ex(&mut vi, &mut session, "3>>"));
    assert_eq!(lines(&vi)[2], "        c");
    assert!(ex(&mut vi, &mut session, "%<<"));
    assert_eq!(lines(&vi), ["a", "b", "c"]);

    assert!(ex(&mut vi, &mut session, "se sw=2"));
    assert!(ex(&mut vi, &mut session, "> 2"));
    assert_eq!(lines(&vi), ["  a", "  b", "c"]);
}

// ==================== line number / set ====================

#[test]
fn test_line_number() {
    let (mut vi, mut session) = vi(HELLO);
    assert!(ex(&mut vi, &mut session, "="));
    assert_eq!(session.registers.get('=').map(|r| r.content.as_str()), Some("6"));
    run(&mut vi, &mut session, &["2j"]);
    assert!(ex(&mut vi, &mut session, ".="));
    assert_eq!(session.registers.get('=').map(|r| r.content.as_str()), Some("3"));
}

#[test]
fn test_set_options() {
    let (mut vi, mut session) = vi(HELLO);
    assert!(ex(&mut vi, &mut session, "set ic sw=2 ai"));
    assert!(vi.options().ignore_case);
    assert_eq!(vi.options().shift_width, 2);
    assert!(vi.options().auto_indent);

    // one bad option leaves every option as it was
    assert!(!ex(&mut vi, &mut session, "set noic bogus"));
    assert!(vi.options().ignore_case);
}

// ==================== failures ====================

#[test]
fn test_unknown_command_changes_nothing() {
    let (mut vi, mut session) = vi(HELLO);
    assert!(ex(&mut vi, &mut session, "1d"));
    let text = vi.buffer().text();
    assert!(!ex(&mut vi, &mut session, "frobnicate"));
    assert!(!ex(&mut vi, &mut session, "1,2#"));
    assert_eq!(vi.buffer().text(), text);
    assert_eq!(session.registers.get(':').map(|r| r.content.as_str()), Some("1d"));
}

#[test]
fn test_read_only_refuses_changes() {
    let (mut vi, mut session) = vi(HELLO);
    vi.buffer_mut().set_read_only(true);
    assert!(!ex(&mut vi, &mut session, "1d"));
    assert!(!ex(&mut vi, &mut session, "%s/hello/bye/"));
    assert!(!ex(&mut vi, &mut session, "1a text"));
    assert!(ex(&mut vi, &mut session, "1,2y"));
    assert_eq!(vi.buffer().text(), HELLO);
}

#[test]
fn test_ex_leaves_visual_mode() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &["j", "V", "j", ":'<,'>d"]);
    assert!(vi.selection().is_none());
    assert_eq!(lines(&vi), ["hello0", "hello3", "hello4", "hello5"]);
}
