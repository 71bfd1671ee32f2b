use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::io::Read;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn sample_text() -> Vec<u8> {
    let mut ans = String::new();
    for i in 0..400 {
        ans += &format!("line {} of the sample, the quick brown fox jumps over the lazy dog\r\n",i % 37);
    }
    ans.into_bytes()
}

fn compress_test(method: &str,extra: &[&str]) -> Result<(Vec<u8>,Vec<u8>),Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("huffdeflate")?;
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("sample.txt");
    let out_path = temp_dir.path().join("sample.out");
    let txt = sample_text();
    std::fs::write(&in_path,&txt)?;
    cmd.arg("compress")
        .arg("-m").arg(method)
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .args(extra)
        .assert()
        .success()
        .stderr(predicate::str::starts_with(format!("compressed {} into",txt.len())));
    Ok((txt,std::fs::read(out_path)?))
}

#[test]
fn compress_deflate() -> STDRESULT {
    let (txt,compressed) = compress_test("deflate",&[])?;
    assert!(compressed.len() < txt.len() / 4);
    let mut ans = Vec::new();
    flate2::read::DeflateDecoder::new(&compressed[..]).read_to_end(&mut ans)?;
    assert_eq!(ans,txt);
    Ok(())
}

#[test]
fn compress_deflate_no_rle() -> STDRESULT {
    let (txt,compressed) = compress_test("deflate",&["--no-rle"])?;
    let mut ans = Vec::new();
    flate2::read::DeflateDecoder::new(&compressed[..]).read_to_end(&mut ans)?;
    assert_eq!(ans,txt);
    Ok(())
}

#[test]
fn compress_zlib() -> STDRESULT {
    let (txt,compressed) = compress_test("zlib",&[])?;
    assert_eq!(compressed[0..2],[0x78,0x9c]);
    let mut ans = Vec::new();
    flate2::read::ZlibDecoder::new(&compressed[..]).read_to_end(&mut ans)?;
    assert_eq!(ans,txt);
    Ok(())
}

#[test]
fn unknown_method() -> STDRESULT {
    let mut cmd = Command::cargo_bin("huffdeflate")?;
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("sample.txt");
    std::fs::write(&in_path,b"abc")?;
    cmd.arg("compress")
        .arg("-m").arg("lzw")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(temp_dir.path().join("sample.out"))
        .assert()
        .failure();
    Ok(())
}

#[test]
fn missing_input() -> STDRESULT {
    let mut cmd = Command::cargo_bin("huffdeflate")?;
    let temp_dir = tempfile::tempdir()?;
    cmd.arg("compress")
        .arg("-m").arg("deflate")
        .arg("-i").arg(temp_dir.path().join("nothing.txt"))
        .arg("-o").arg(temp_dir.path().join("nothing.out"))
        .assert()
        .failure();
    Ok(())
}
