//! Command dispatcher tests
//!
//! Source: src/vi.rs, src/motion.rs
//! Covers: motions, operators, counts, insert, visual modes, dot-repeat,
//! registers, prefixed commands

use super::{run, vi};
use exvi_core::{Cursor, Host, Mode, Target, TextBuffer};
use pretty_assertions::assert_eq;

fn text(vi: &exvi_core::Vi<exvi_core::RopeBuffer>) -> String {
    vi.buffer().text()
}

const HELLO: &str = "hello0\nhello1\nhello2\nhello3\nhello4\nhello5\n";

// ==================== motions ====================

#[test]
fn test_basic_motions() {
    let (mut vi, mut session) = vi("hello world\nfoo bar\n");
    run(&mut vi, &mut session, &["w"]);
    assert_eq!(vi.caret(), Cursor::new(0, 6));
    run(&mut vi, &mut session, &["$"]);
    assert_eq!(vi.caret(), Cursor::new(0, 10));
    run(&mut vi, &mut session, &["j"]);
    assert_eq!(vi.caret(), Cursor::new(1, 6));
    run(&mut vi, &mut session, &["0", "2l"]);
    assert_eq!(vi.caret(), Cursor::new(1, 2));
    run(&mut vi, &mut session, &["b"]);
    assert_eq!(vi.caret(), Cursor::new(1, 0));
    run(&mut vi, &mut session, &["k", "e"]);
    assert_eq!(vi.caret(), Cursor::new(0, 4));
}

#[test]
fn test_failed_motion_is_rejected() {
    let (mut vi, mut session) = vi("ab\n");
    assert!(!vi.command(&mut session, "h"));
    assert!(!vi.command(&mut session, "k"));
    assert!(!vi.command(&mut session, "fz"));
    assert_eq!(vi.caret(), Cursor::new(0, 0));
}

#[test]
fn test_failed_tail_undoes_whole_command() {
    let (mut vi, mut session) = vi("a\nb\nc\n");
    run(&mut vi, &mut session, &["yy", "x"]);
    assert_eq!(text(&vi), "\nb\nc\n");
    assert!(!vi.command(&mut session, "jddQ"));
    assert_eq!(text(&vi), "\nb\nc\n");
    assert_eq!(vi.caret(), Cursor::new(0, 0));
    assert_eq!(session.registers.last_command(), Some("x"));
    assert_eq!(session.registers.get('"').map(|r| r.content.as_str()), Some("a"));

    // the rolled back change leaves nothing to undo
    run(&mut vi, &mut session, &["u"]);
    assert_eq!(text(&vi), "a\nb\nc\n");
}

#[test]
fn test_failed_find_keeps_repeat() {
    let (mut vi, mut session) = vi("a,b,c\n");
    run(&mut vi, &mut session, &["f,"]);
    assert!(!vi.command(&mut session, "fz"));
    run(&mut vi, &mut session, &[";"]);
    assert_eq!(vi.caret().column, 3);
}

#[test]
fn test_failed_search_keeps_pattern() {
    let (mut vi, mut session) = vi("one\ntwo\none\ntwo\n");
    run(&mut vi, &mut session, &["/two\r"]);
    assert!(!vi.command(&mut session, "?zzz\r"));
    assert_eq!(session.registers.search(), Some("two"));
    assert!(session.registers.search_forward());
    run(&mut vi, &mut session, &["n"]);
    assert_eq!(vi.caret(), Cursor::new(3, 0));
}

#[test]
fn test_goto_lines() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &["G"]);
    assert_eq!(vi.caret().line, 5);
    run(&mut vi, &mut session, &["3G"]);
    assert_eq!(vi.caret().line, 2);
    run(&mut vi, &mut session, &["gg"]);
    assert_eq!(vi.caret().line, 0);
    run(&mut vi, &mut session, &["50%"]);
    assert_eq!(vi.caret().line, 2);
}

#[test]
fn test_find_char_and_repeat() {
    let (mut vi, mut session) = vi("a.b.c.d\n");
    run(&mut vi, &mut session, &["f."]);
    assert_eq!(vi.caret().column, 1);
    run(&mut vi, &mut session, &["2;"]);
    assert_eq!(vi.caret().column, 5);
    run(&mut vi, &mut session, &[","]);
    assert_eq!(vi.caret().column, 3);
    run(&mut vi, &mut session, &["0", "t."]);
    assert_eq!(vi.caret().column, 0);
    // a repeated till skips the character it stopped before
    run(&mut vi, &mut session, &[";"]);
    assert_eq!(vi.caret().column, 2);
}

#[test]
fn test_search_and_repeat() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &["/hello\r"]);
    assert_eq!(vi.caret(), Cursor::new(1, 0));
    run(&mut vi, &mut session, &["n"]);
    assert_eq!(vi.caret(), Cursor::new(2, 0));
    run(&mut vi, &mut session, &["N"]);
    assert_eq!(vi.caret(), Cursor::new(1, 0));
    run(&mut vi, &mut session, &["?hello4\r"]);
    assert_eq!(vi.caret(), Cursor::new(4, 0));
    assert_eq!(session.registers.search(), Some("hello4"));
    assert!(!vi.command(&mut session, "/nothere\r"));
}

#[test]
fn test_markers_and_jumps() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &["2j", "3l", "ma", "G"]);
    assert_eq!(vi.caret().line, 5);
    run(&mut vi, &mut session, &["'a"]);
    assert_eq!(vi.caret(), Cursor::new(2, 0));
    run(&mut vi, &mut session, &["`a"]);
    assert_eq!(vi.caret(), Cursor::new(2, 3));
    run(&mut vi, &mut session, &["G", "''"]);
    assert_eq!(vi.caret().line, 2);
    assert!(!vi.command(&mut session, "'q"));
}

#[test]
fn test_match_pair() {
    let (mut vi, mut session) = vi("if (a[1] == b) {\n}\n");
    run(&mut vi, &mut session, &["%"]);
    assert_eq!(vi.caret(), Cursor::new(0, 13));
    run(&mut vi, &mut session, &["%"]);
    assert_eq!(vi.caret(), Cursor::new(0, 3));
    run(&mut vi, &mut session, &["$", "%"]);
    assert_eq!(vi.caret(), Cursor::new(1, 0));
}

// ==================== operators ====================

#[test]
fn test_delete_lines() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &["dd"]);
    assert_eq!(vi.buffer().line(0).as_deref(), Some("hello1"));
    assert_eq!(session.registers.get('"').map(|r| r.content.as_str()), Some("hello0\n"));
    run(&mut vi, &mut session, &["2dd"]);
    assert_eq!(text(&vi), "hello3\nhello4\nhello5\n");
    run(&mut vi, &mut session, &["dj"]);
    assert_eq!(text(&vi), "hello5\n");
}

#[test]
fn test_delete_motions() {
    let (mut vi, mut session) = vi("hello big world\n");
    run(&mut vi, &mut session, &["dw"]);
    assert_eq!(text(&vi), "big world\n");
    run(&mut vi, &mut session, &["de"]);
    assert_eq!(text(&vi), " world\n");
    run(&mut vi, &mut session, &["l", "d$"]);
    assert_eq!(text(&vi), " \n");
    assert_eq!(vi.caret(), Cursor::new(0, 0));
}

#[test]
fn test_delete_till_and_pair() {
    let (mut vi, mut session) = vi("hello world\n");
    run(&mut vi, &mut session, &["dt "]);
    assert_eq!(text(&vi), " world\n");

    let (mut vi, mut session) = super::vi("(a b) c\n");
    run(&mut vi, &mut session, &["d%"]);
    assert_eq!(text(&vi), " c\n");
}

#[test]
fn test_aliases() {
    let (mut vi, mut session) = vi("abcdef\n");
    run(&mut vi, &mut session, &["x"]);
    assert_eq!(text(&vi), "bcdef\n");
    run(&mut vi, &mut session, &["2x"]);
    assert_eq!(text(&vi), "def\n");
    run(&mut vi, &mut session, &["$", "X"]);
    assert_eq!(text(&vi), "df\n");
    run(&mut vi, &mut session, &["0", "D"]);
    assert_eq!(text(&vi), "\n");
}

#[test]
fn test_yank_and_put() {
    let (mut vi, mut session) = vi("one\ntwo\n");
    run(&mut vi, &mut session, &["yyp"]);
    assert_eq!(text(&vi), "one\none\ntwo\n");
    assert_eq!(vi.caret(), Cursor::new(1, 0));
    run(&mut vi, &mut session, &["G", "P"]);
    assert_eq!(text(&vi), "one\none\none\ntwo\n");

    let (mut vi, mut session) = super::vi("ab\n");
    run(&mut vi, &mut session, &["ylp"]);
    assert_eq!(text(&vi), "aab\n");
    run(&mut vi, &mut session, &["3P"]);
    assert_eq!(text(&vi), "aaaaab\n");
}

#[test]
fn test_named_registers() {
    let (mut vi, mut session) = vi("one\ntwo\n");
    run(&mut vi, &mut session, &["\"ayy", "j", "\"Ayy", "\"ap"]);
    assert_eq!(text(&vi), "one\ntwo\none\ntwo\n");
    assert!(!vi.command(&mut session, "\"qp"));
    assert!(!vi.command(&mut session, "\"!p"));
}

#[test]
fn test_black_hole_register() {
    let (mut vi, mut session) = vi("one\ntwo\n");
    run(&mut vi, &mut session, &["yy", "\"_dd"]);
    assert_eq!(session.registers.get('"').map(|r| r.content.as_str()), Some("one\n"));
    assert_eq!(text(&vi), "two\n");
}

#[test]
fn test_shift_lines() {
    let (mut vi, mut session) = vi("a\nb\nc\n");
    run(&mut vi, &mut session, &["2>>"]);
    assert_eq!(text(&vi), "    a\n    b\nc\n");
    run(&mut vi, &mut session, &["<j"]);
    assert_eq!(text(&vi), "a\nb\nc\n");
}

#[test]
fn test_join_case_replace() {
    let (mut vi, mut session) = vi("ab\ncd\nef\n");
    run(&mut vi, &mut session, &["J"]);
    assert_eq!(text(&vi), "ab cd\nef\n");
    run(&mut vi, &mut session, &["0", "~"]);
    assert_eq!(text(&vi), "Ab cd\nef\n");
    assert_eq!(vi.caret(), Cursor::new(0, 1));
    run(&mut vi, &mut session, &["3rx"]);
    assert_eq!(text(&vi), "Axxxd\nef\n");
    assert!(!vi.command(&mut session, "9rx"));
}

#[test]
fn test_undo_redo() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &["dd", "dd"]);
    run(&mut vi, &mut session, &["u"]);
    assert_eq!(vi.buffer().line(0).as_deref(), Some("hello1"));
    run(&mut vi, &mut session, &["u"]);
    assert_eq!(text(&vi), HELLO);
    assert!(!vi.command(&mut session, "u"));
    run(&mut vi, &mut session, &["2\x12"]);
    assert_eq!(vi.buffer().line(0).as_deref(), Some("hello2"));
}

#[test]
fn test_incomplete_commands_change_nothing() {
    let (mut vi, mut session) = vi("text\n");
    for command in ["d", "y", "c", "\"", "\"a", "r", "m", "zz", "3"] {
        assert!(!vi.command(&mut session, command), "{command:?}");
    }
    assert_eq!(text(&vi), "text\n");
    assert_eq!(vi.mode().get(), Mode::Command);
}

// ==================== insert ====================

#[test]
fn test_insert_variants() {
    let (mut vi, mut session) = vi("  mid\n");
    run(&mut vi, &mut session, &["I<\x1b", "A>\x1b", "0ix\x1b"]);
    assert_eq!(text(&vi), "x  <mid>\n");
    run(&mut vi, &mut session, &["Oabove\x1b", "jobelow\x1b"]);
    assert_eq!(text(&vi), "above\nx  <mid>\nbelow\n");
}

#[test]
fn test_insert_counts() {
    let (mut vi, mut session) = vi("\n");
    run(&mut vi, &mut session, &["3ix\x1b"]);
    assert_eq!(text(&vi), "xxx\n");
    assert_eq!(vi.caret(), Cursor::new(0, 2));

    let (mut vi, mut session) = super::vi("a\n");
    run(&mut vi, &mut session, &["2ohey\x1b"]);
    assert_eq!(text(&vi), "a\nhey\nhey\n");
}

#[test]
fn test_insert_across_commands() {
    let (mut vi, mut session) = vi("ab\n");
    run(&mut vi, &mut session, &["a"]);
    assert!(vi.mode().is_insert());
    run(&mut vi, &mut session, &["X", "Y\rZ", "\x1b"]);
    assert_eq!(text(&vi), "aXY\nZb\n");
    assert!(!vi.mode().is_insert());
    assert_eq!(session.registers.get('.').map(|r| r.content.as_str()), Some("XY\nZ"));
}

#[test]
fn test_replace_mode_and_backspace() {
    let (mut vi, mut session) = vi("abcd\n");
    run(&mut vi, &mut session, &["Rxy\x08\x08z\x1b"]);
    assert_eq!(text(&vi), "zbcd\n");
    run(&mut vi, &mut session, &["$", "a12\x08\x1b"]);
    assert_eq!(text(&vi), "zbcd1\n");
}

#[test]
fn test_change_commands() {
    let (mut vi, mut session) = vi("hello world\n");
    run(&mut vi, &mut session, &["cwbye\x1b"]);
    assert_eq!(text(&vi), "bye world\n");
    run(&mut vi, &mut session, &["w", "C!\x1b"]);
    assert_eq!(text(&vi), "bye !\n");
    run(&mut vi, &mut session, &["Snew\x1b"]);
    assert_eq!(text(&vi), "new\n");
    run(&mut vi, &mut session, &["0", "s*\x1b"]);
    assert_eq!(text(&vi), "*ew\n");
}

#[test]
fn test_change_lines_keeps_indent() {
    let (mut vi, mut session) = vi("  foo\n  bar\n");
    vi.options_mut().auto_indent = true;
    run(&mut vi, &mut session, &["ccbaz\x1b"]);
    assert_eq!(text(&vi), "  baz\n  bar\n");
    run(&mut vi, &mut session, &["A\rqux\x1b"]);
    assert_eq!(text(&vi), "  baz\n  qux\n  bar\n");

    vi.options_mut().auto_indent = false;
    run(&mut vi, &mut session, &["2ccend\x1b"]);
    assert_eq!(text(&vi), "  baz\nend\n");
}

// ==================== dot-repeat ====================

#[test]
fn test_dot_repeats_change() {
    let (mut vi, mut session) = vi("hello world\n");
    run(&mut vi, &mut session, &["cwbye\x1b", "w", "."]);
    assert_eq!(text(&vi), "bye bye\n");
    assert_eq!(session.registers.last_command(), Some("cwbye\x1b"));
}

#[test]
fn test_dot_with_new_count() {
    let (mut vi, mut session) = vi("a b c d e\n");
    run(&mut vi, &mut session, &["dw", "2."]);
    assert_eq!(text(&vi), "d e\n");
    assert_eq!(session.registers.last_command(), Some("2dw"));
    run(&mut vi, &mut session, &["."]);
    assert_eq!(text(&vi), "\n");
}

#[test]
fn test_dot_ignores_motions_and_yanks() {
    let (mut vi, mut session) = vi("abc\nabc\n");
    run(&mut vi, &mut session, &["x", "j", "yy", "l", "."]);
    assert_eq!(text(&vi), "bc\nac\n");
}

#[test]
fn test_dot_repeats_insert_and_alias() {
    let (mut vi, mut session) = vi("a\nb\n");
    run(&mut vi, &mut session, &["A;\x1b", "j", "."]);
    assert_eq!(text(&vi), "a;\nb;\n");

    let (mut fresh, mut session) = super::vi("x\n");
    assert!(!fresh.command(&mut session, "."));
}

// ==================== visual ====================

#[test]
fn test_visual_delete() {
    let (mut vi, mut session) = vi("abc\ndef\n");
    run(&mut vi, &mut session, &["l", "vjd"]);
    assert_eq!(text(&vi), "af\n");
    assert_eq!(vi.mode().get(), Mode::Command);
    assert_eq!(session.registers.get('"').map(|r| r.content.as_str()), Some("bc\nde"));
}

#[test]
fn test_visual_selection_and_swap() {
    let (mut vi, mut session) = vi("abcdef\n");
    run(&mut vi, &mut session, &["l", "v", "2l"]);
    assert_eq!(vi.selection(), Some((Cursor::new(0, 1), Cursor::new(0, 3))));
    run(&mut vi, &mut session, &["o"]);
    assert_eq!(vi.selection(), Some((Cursor::new(0, 3), Cursor::new(0, 1))));
    run(&mut vi, &mut session, &["y"]);
    assert_eq!(session.registers.get('0').map(|r| r.content.as_str()), Some("bcd"));
    assert_eq!(vi.selection(), None);
    assert_eq!(vi.buffer().marker('<'), Some(Cursor::new(0, 1)));
    assert_eq!(vi.buffer().marker('>'), Some(Cursor::new(0, 3)));
}

#[test]
fn test_visual_line_operators() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &["Vj>"]);
    assert_eq!(vi.buffer().line(1).as_deref(), Some("    hello1"));
    run(&mut vi, &mut session, &["Vjd"]);
    assert_eq!(vi.buffer().line(0).as_deref(), Some("hello2"));
    run(&mut vi, &mut session, &["VjJ"]);
    assert_eq!(vi.buffer().line(0).as_deref(), Some("hello2 hello3"));
}

#[test]
fn test_visual_case_and_replace() {
    let (mut vi, mut session) = vi("abc def\n");
    run(&mut vi, &mut session, &["v$~"]);
    assert_eq!(text(&vi), "ABC DEF\n");
    run(&mut vi, &mut session, &["0", "veu"]);
    assert_eq!(text(&vi), "abc DEF\n");
    run(&mut vi, &mut session, &["w", "vlr-"]);
    assert_eq!(text(&vi), "abc --F\n");
}

#[test]
fn test_visual_change() {
    let (mut vi, mut session) = vi("one two three\n");
    run(&mut vi, &mut session, &["w", "vecTWO\x1b"]);
    assert_eq!(text(&vi), "one TWO three\n");
    assert_eq!(vi.mode().get(), Mode::Command);
}

#[test]
fn test_visual_escape_marks_selection() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &["j", "V", "j", "\x1b"]);
    assert_eq!(vi.mode().get(), Mode::Command);
    run(&mut vi, &mut session, &[":'<,'>d"]);
    assert_eq!(text(&vi), "hello0\nhello3\nhello4\nhello5\n");
}

#[test]
fn test_visual_block_delete() {
    let (mut vi, mut session) = vi("abc\nabc\nabc\n");
    run(&mut vi, &mut session, &["\x16", "jl", "d"]);
    assert_eq!(text(&vi), "c\nc\nabc\n");
    assert_eq!(vi.mode().get(), Mode::Command);
}

#[test]
fn test_visual_block_insert_and_append() {
    let (mut vi, mut session) = vi("abc\nabc\nabc\n");
    run(&mut vi, &mut session, &["\x16", "jj", "I#\x1b"]);
    assert_eq!(text(&vi), "#abc\n#abc\n#abc\n");
    assert_eq!(vi.mode().get(), Mode::VisualBlock);
    run(&mut vi, &mut session, &["\x1b"]);

    let (mut vi, mut session) = super::vi("ab\nabcd\nx\n");
    run(&mut vi, &mut session, &["K", "jj", "A!\x1b", "\x1b"]);
    assert_eq!(text(&vi), "a!b\na!bcd\nx!\n");
}

#[test]
fn test_visual_block_uses_screen_columns() {
    let (mut vi, mut session) = vi("中ab\nxyzw\n");
    run(&mut vi, &mut session, &["\x16", "jl", "d"]);
    assert_eq!(text(&vi), "ab\nzw\n");
    assert_eq!(session.registers.get('"').map(|r| r.content.as_str()), Some("中\nxy"));
}

// ==================== prefixed commands ====================

#[test]
fn test_ex_from_dispatcher() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &[":2,3d"]);
    assert_eq!(vi.buffer().line_count(), 4);
    assert_eq!(session.registers.get(':').map(|r| r.content.as_str()), Some("2,3d"));
    assert!(!vi.command(&mut session, ":bogus"));
    assert_eq!(session.registers.get(':').map(|r| r.content.as_str()), Some("2,3d"));
}

#[test]
fn test_calc() {
    let (mut vi, mut session) = vi(HELLO);
    run(&mut vi, &mut session, &["2j", "=. * 10 + $"]);
    assert_eq!(session.registers.get('=').map(|r| r.content.as_str()), Some("36"));
    assert!(!vi.command(&mut session, "=1 +"));
}

#[test]
fn test_exec_goes_to_host() {
    struct Shell {
        ok: bool,
    }
    impl Host for Shell {
        fn exec(&mut self, command: &str) -> bool {
            self.ok && command == "make"
        }
    }
    let (mut vi, mut session) = vi("a\n");
    assert!(!vi.command(&mut session, "!make"));
    vi.set_host(Box::new(Shell { ok: true }));
    assert!(vi.command(&mut session, "!make"));
    assert!(!vi.command(&mut session, "!other"));
}

#[test]
fn test_margin_find_restores_target() {
    let (mut vi, mut session) = vi(HELLO);
    vi.set_target(Target::Margin);
    // the default buffer has no margin text
    assert!(!vi.command(&mut session, "/hello\r"));
    assert_eq!(vi.target(), Target::Text);
    run(&mut vi, &mut session, &["/hello\r"]);
    assert_eq!(vi.caret().line, 1);
}
