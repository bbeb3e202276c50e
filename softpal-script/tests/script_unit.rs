use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use softpal_nls::Decoder;
use softpal_script::consts::{
    GAME_DEFAULT_MAX_LINE_WIDTH, GAME_DEFAULT_SPACING_BETWEEN_LINES, LINE_SPACING_OFFSET, MAX_LINE_WIDTH_OFFSET,
    POINT_MAGIC,
};
use softpal_script::disasm::{CodeBuilder, OperandKind, TextSyscall};
use softpal_script::format::{TextPool, CODE_FILE_NAME, POINT_FILE_NAME, TEXT_FILE_NAME};
use softpal_script::transform::CellMetrics;
use softpal_script::{
    FontProfiles, PatchConfig, ScriptError, ScriptString, ScriptStringType, Softpalizer, SoftpalScript,
};

use ScriptStringType::*;

/// A script unit on disk: code, pool and an empty label table.
struct Unit {
    _dir: TempDir,
    code_path: PathBuf,
}

fn pool(strings: &[&str]) -> (TextPool, Vec<u32>) {
    let nls = Decoder::default();
    let mut pool = TextPool::from_bytes(b"$TEXT_LIST__".to_vec());
    let addrs = strings
        .iter()
        .map(|s| pool.append_str(s, &nls).unwrap())
        .collect();
    (pool, addrs)
}

fn write_unit(code: &[u8], pool: &TextPool) -> Unit {
    let dir = tempfile::tempdir().unwrap();
    let code_path = dir.path().join(CODE_FILE_NAME);
    fs::write(&code_path, code).unwrap();
    fs::write(dir.path().join(TEXT_FILE_NAME), pool.as_bytes()).unwrap();
    fs::write(dir.path().join(POINT_FILE_NAME), POINT_MAGIC).unwrap();
    Unit { _dir: dir, code_path }
}

fn fonts() -> FontProfiles {
    let config = PatchConfig {
        proportional_font_size: 20,
        proportional_line_width: 2000,
        ..Default::default()
    };
    FontProfiles::with_metrics(Box::new(CellMetrics), &config)
}

fn load(unit: &Unit) -> SoftpalScript {
    SoftpalScript::load(&unit.code_path, &PatchConfig::default()).unwrap()
}

fn extract(script: &SoftpalScript) -> Vec<ScriptString> {
    script.strings().collect::<softpal_script::Result<_>>().unwrap()
}

/// Strings each operand points at after patching, in operand order.
fn resolve_all(script: &SoftpalScript, code: &[u8], text: &[u8]) -> Vec<(ScriptStringType, String)> {
    let patched = SoftpalScript::from_parts(code.to_vec(), text.to_vec(), &[]).unwrap();
    assert_eq!(patched.operands(), script.operands());
    patched
        .operands()
        .iter()
        .map(|o| (o.ty, patched.resolve(o).unwrap()))
        .collect()
}

fn dialogue_unit() -> Unit {
    let (pool, a) = pool(&["Greg", "Hello there", "Quiet night.", "Go left"]);
    let mut b = CodeBuilder::new();
    b.message(Some(a[0]), a[1]);
    b.message(None, a[2]);
    b.select(a[3]);
    b.exit();
    write_unit(&b.finish(), &pool)
}

fn split_unit() -> Unit {
    let (pool, a) = pool(&["Greg", "Oh... no!!", "Oh... ", "no!!"]);
    let mut b = CodeBuilder::new();
    b.backlog(a[0], a[1]);
    b.message(Some(a[0]), a[2]);
    b.message(Some(a[0]), a[3]);
    b.exit();
    write_unit(&b.finish(), &pool)
}

#[test]
fn extract_skips_backlog_operands() {
    let script = load(&dialogue_unit());
    assert_eq!(
        extract(&script),
        vec![
            ScriptString::new("Greg", CharacterName),
            ScriptString::new("Hello there", DialogueMessage),
            ScriptString::new("Quiet night.", DialogueMessage),
            ScriptString::new("Go left", SelectionChoice),
        ]
    );

    let script = load(&split_unit());
    assert_eq!(script.operands().len(), 6);
    let types: Vec<_> = extract(&script).into_iter().map(|s| s.ty).collect();
    assert_eq!(types, vec![CharacterName, DialogueMessage, CharacterName, DialogueMessage]);
}

#[test]
fn round_trip_rewrites_every_operand() -> Result<()> {
    let unit = dialogue_unit();
    let script = load(&unit);
    let strings = extract(&script);
    let fonts = fonts();
    let softpalizer = Softpalizer::new(&fonts, &PatchConfig::default());

    let out = tempfile::tempdir()?;
    let stats = script.write_patched(strings.clone(), out.path().join(CODE_FILE_NAME), &softpalizer)?;
    assert_eq!(stats.operands, 4);
    assert_eq!(stats.consumed, strings.len());
    assert_eq!(stats.placeholders, 0);

    let code = fs::read(out.path().join(CODE_FILE_NAME))?;
    let text = fs::read(out.path().join(TEXT_FILE_NAME))?;
    assert_eq!(code.len(), script.code().len());
    // the old pool is kept and only appended to
    assert!(text.starts_with(script.text().as_bytes()));

    assert_eq!(
        resolve_all(&script, &code, &text),
        vec![
            (CharacterName, "Greg".to_string()),
            (DialogueMessage, "Hello|there".to_string()),
            (DialogueMessage, "Quiet|night.".to_string()),
            (SelectionChoice, "Go|left".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn split_log_is_rebuilt_from_both_halves() -> Result<()> {
    let script = load(&split_unit());
    let strings = extract(&script);
    let fonts = fonts();
    let softpalizer = Softpalizer::new(&fonts, &PatchConfig::default());

    let patched = script.patch(strings.clone(), &softpalizer)?;
    assert_eq!(patched.stats.split_groups, 1);
    assert_eq!(patched.stats.operands, 6);
    // every extracted string is consumed exactly once
    assert_eq!(patched.stats.consumed, strings.len());

    let resolved = resolve_all(&script, patched.code.as_bytes(), patched.text.as_bytes());
    assert_eq!(
        resolved,
        vec![
            (LogCharacterName, "Greg".to_string()),
            (LogMessage, "Oh...|no!!".to_string()),
            (CharacterName, "Greg".to_string()),
            (DialogueMessage, "Oh...".to_string()),
            (CharacterName, "Greg".to_string()),
            (DialogueMessage, "|no!!".to_string()),
        ]
    );
    assert_eq!(format!("{}{}", resolved[3].1, resolved[5].1), resolved[1].1);
    Ok(())
}

#[test]
fn split_cut_never_lands_inside_a_break() -> Result<()> {
    let script = load(&split_unit());
    // "Oh..." fills the line exactly, so the space between the halves becomes a break
    let config = PatchConfig {
        proportional_font_size: 20,
        proportional_line_width: 50,
        ..Default::default()
    };
    let fonts = FontProfiles::with_metrics(Box::new(CellMetrics), &config);
    let softpalizer = Softpalizer::new(&fonts, &config);

    let patched = script.patch(extract(&script), &softpalizer)?;
    let resolved = resolve_all(&script, patched.code.as_bytes(), patched.text.as_bytes());
    assert_eq!(resolved[1].1, "Oh...<br>no!!");
    assert_eq!(resolved[3].1, "Oh...");
    assert_eq!(resolved[5].1, "<br>no!!");
    Ok(())
}

#[test]
fn addresses_grow_in_operand_order() -> Result<()> {
    let script = load(&split_unit());
    let fonts = fonts();
    let softpalizer = Softpalizer::new(&fonts, &PatchConfig::default());
    let patched = script.patch(extract(&script), &softpalizer)?;

    let addrs: Vec<u32> = script
        .operands()
        .iter()
        .map(|o| patched.code.read_u32(o.offset as usize))
        .collect::<softpal_script::Result<_>>()?;
    assert!(addrs.windows(2).all(|w| w[0] < w[1]), "{addrs:?}");
    assert!(addrs[0] as usize >= script.text().len());
    Ok(())
}

#[test]
fn type_mismatch_names_the_slot() {
    let unit = dialogue_unit();
    let script = load(&unit);
    let mut strings = extract(&script);
    strings[1].ty = CharacterName;

    let fonts = fonts();
    let softpalizer = Softpalizer::new(&fonts, &PatchConfig::default());
    let out = tempfile::tempdir().unwrap();
    let err = script
        .write_patched(strings, out.path().join(CODE_FILE_NAME), &softpalizer)
        .unwrap_err();
    match err {
        ScriptError::TypeMismatch {
            iteration,
            offset,
            expected,
            actual,
            text,
        } => {
            assert_eq!(iteration, 2);
            assert_eq!(offset, script.operands()[1].offset);
            assert_eq!(expected, DialogueMessage);
            assert_eq!(actual, CharacterName);
            assert_eq!(text, "Hello there");
        }
        other => panic!("unexpected error: {other}"),
    }
    // nothing is written on failure
    assert!(!out.path().join(CODE_FILE_NAME).exists());
    assert!(!out.path().join(TEXT_FILE_NAME).exists());
}

#[test]
fn too_few_or_too_many_lines() {
    let script = load(&dialogue_unit());
    let strings = extract(&script);
    let fonts = fonts();
    let softpalizer = Softpalizer::new(&fonts, &PatchConfig::default());

    let short = strings[..3].to_vec();
    assert!(matches!(
        script.patch(short, &softpalizer).err(),
        Some(ScriptError::Underrun { iteration: 4 })
    ));

    let mut long = strings.clone();
    long.push(ScriptString::new("extra", SelectionChoice));
    assert!(matches!(script.patch(long, &softpalizer).err(), Some(ScriptError::Overrun)));

    // a split group needs all four of its strings
    let script = load(&split_unit());
    let strings = extract(&script)[..2].to_vec();
    assert!(matches!(
        script.patch(strings, &softpalizer).err(),
        Some(ScriptError::Underrun { iteration: 1 })
    ));
}

#[test]
fn split_group_checks_types() {
    let script = load(&split_unit());
    let mut strings = extract(&script);
    strings[2].ty = DialogueMessage;
    let fonts = fonts();
    let softpalizer = Softpalizer::new(&fonts, &PatchConfig::default());
    assert!(matches!(
        script.patch(strings, &softpalizer).err(),
        Some(ScriptError::TypeMismatch {
            iteration: 1,
            expected: CharacterName,
            actual: DialogueMessage,
            ..
        })
    ));
}

#[test]
fn loose_backlog_message_gets_a_placeholder() -> Result<()> {
    let (pool, a) = pool(&["Dear Greg", "Greg", "Dear Greg"]);
    let mut b = CodeBuilder::new();
    // speaker held in a variable, so only the message is a text operand
    b.push_var(OperandKind::Global(3));
    b.push(a[0]);
    b.syscall(TextSyscall::BacklogAdd.id());
    b.message(Some(a[1]), a[2]);
    b.exit();
    let unit = write_unit(&b.finish(), &pool);

    let script = load(&unit);
    let strings = extract(&script);
    assert_eq!(strings.len(), 2);

    let fonts = fonts();
    let softpalizer = Softpalizer::new(&fonts, &PatchConfig::default());
    let patched = script.patch(strings, &softpalizer)?;
    assert_eq!(patched.stats.placeholders, 1);
    assert_eq!(patched.stats.consumed, 2);

    let resolved = resolve_all(&script, patched.code.as_bytes(), patched.text.as_bytes());
    assert_eq!(resolved[0], (LogMessage, "TODO".to_string()));
    assert_eq!(resolved[2], (DialogueMessage, "Dear|Greg".to_string()));
    Ok(())
}

#[test]
fn letter_narration_gets_placeholders() -> Result<()> {
    let (pool, a) = pool(&["x", "Susie", "Dear Greg"]);
    let mut b = CodeBuilder::new();
    for _ in 1..47744 {
        b.select(a[0]);
    }
    b.backlog(a[1], a[2]);
    b.exit();
    let unit = write_unit(&b.finish(), &pool);

    let script = load(&unit);
    let strings = extract(&script);
    assert_eq!(strings.len(), 47743);

    let fonts = fonts();
    let softpalizer = Softpalizer::new(&fonts, &PatchConfig::default());
    let patched = script.patch(strings, &softpalizer)?;
    assert_eq!(patched.stats.placeholders, 2);
    assert_eq!(patched.stats.split_groups, 0);

    let ops = script.operands();
    let tail: Vec<String> = ops[ops.len() - 2..]
        .iter()
        .map(|o| {
            let addr = patched.code.read_u32(o.offset as usize)?;
            patched.text.read_str(addr, &Decoder::default())
        })
        .collect::<softpal_script::Result<_>>()?;
    assert_eq!(tail, vec!["Letter writer".to_string(), "Letter text".to_string()]);
    Ok(())
}

fn padded_code(width: u16, spacing: u16) -> Vec<u8> {
    let (_, a) = pool(&["x"]);
    let mut b = CodeBuilder::new();
    b.select(a[0]);
    b.exit();
    b.pad_to(MAX_LINE_WIDTH_OFFSET + 0x10);
    let mut code = b.finish();
    code[MAX_LINE_WIDTH_OFFSET..MAX_LINE_WIDTH_OFFSET + 2].copy_from_slice(&width.to_le_bytes());
    code[LINE_SPACING_OFFSET..LINE_SPACING_OFFSET + 2].copy_from_slice(&spacing.to_le_bytes());
    code
}

#[test]
fn layout_constants_are_patched_only_when_stock() -> Result<()> {
    let (pool, _) = pool(&["x"]);
    let config = PatchConfig {
        max_line_width: 590,
        font_y_spacing_between_lines: 12,
        ..Default::default()
    };

    let unit = write_unit(
        &padded_code(GAME_DEFAULT_MAX_LINE_WIDTH, GAME_DEFAULT_SPACING_BETWEEN_LINES),
        &pool,
    );
    let script = SoftpalScript::load(&unit.code_path, &config)?;
    assert_eq!(script.code().read_u16(MAX_LINE_WIDTH_OFFSET)?, 590);
    assert_eq!(script.code().read_u16(LINE_SPACING_OFFSET)?, 12);

    let unit = write_unit(&padded_code(600, 9), &pool);
    let script = SoftpalScript::load(&unit.code_path, &config)?;
    assert_eq!(script.code().read_u16(MAX_LINE_WIDTH_OFFSET)?, 600);
    assert_eq!(script.code().read_u16(LINE_SPACING_OFFSET)?, 9);
    Ok(())
}

fn not_found_path(code_path: &Path) -> PathBuf {
    match SoftpalScript::load(code_path, &PatchConfig::default()) {
        Err(ScriptError::NotFound { path }) => path,
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("load succeeded"),
    }
}

#[test]
fn missing_files_are_reported_by_path() {
    let unit = dialogue_unit();
    let dir = unit.code_path.parent().unwrap().to_path_buf();

    fs::remove_file(dir.join(POINT_FILE_NAME)).unwrap();
    assert_eq!(not_found_path(&unit.code_path), dir.join(POINT_FILE_NAME));

    fs::remove_file(dir.join(TEXT_FILE_NAME)).unwrap();
    assert_eq!(not_found_path(&unit.code_path), dir.join(TEXT_FILE_NAME));

    assert_eq!(not_found_path(&dir.join("NOPE.SRC")), dir.join("NOPE.SRC"));
}

#[test]
fn bad_point_magic_fails_load() {
    let unit = dialogue_unit();
    let dir = unit.code_path.parent().unwrap();
    fs::write(dir.join(POINT_FILE_NAME), b"$POINT_LIST_XXXX").unwrap();
    assert!(matches!(
        SoftpalScript::load(&unit.code_path, &PatchConfig::default()),
        Err(ScriptError::BadMagic { .. })
    ));
}
