use clap::{arg,crate_version,Command};
use huffdeflate::{deflate,zlib,block};
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const RCH: &str = "unreachable was reached";

fn ok_to_overwrite(path_out: &str) -> bool {
    if let Ok(_f) = std::fs::File::open(path_out) {
        let mut ans = String::new();
        eprint!("{} exists, overwrite? (y/n) ",path_out);
        if std::io::stdin().read_line(&mut ans).is_err() {
            return false;
        }
        return ans.trim_end()=="y" || ans.trim_end()=="Y";
    }
    true
}

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"Examples:
---------
Raw DEFLATE:   `huffdeflate compress -m deflate -i my_file -o my_file.deflate`
zlib stream:   `huffdeflate compress -m zlib -i my_file -o my_file.zz`";

    let methods = ["deflate","zlib"];

    let mut main_cmd = Command::new("huffdeflate")
        .about("Compress with length limited Huffman codes into DEFLATE streams")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-m --method <METHOD> "container format").value_parser(methods)
            .required(true))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(--"no-rle" "do not smooth frequencies before building trees"))
        .about("compress a file"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = cmd.get_one::<String>("method").expect(RCH);
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut opt = deflate::STD_OPTIONS;
        opt.rle_smoothing = !cmd.get_flag("no-rle");
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = match method.as_str() {
            "deflate" => deflate::compress(&mut in_file,&mut out_file,&opt)?,
            "zlib" => zlib::compress(&mut in_file,&mut out_file,&opt)?,
            _ => {
                eprintln!("{} not supported",method);
                return Err(Box::new(std::fmt::Error));
            }
        };
        out_file.set_len(out_size)?;
        if log::log_enabled!(log::Level::Debug) {
            let head = std::fs::read(path_out)?;
            let skip = if method == "zlib" { 2 } else { 0 };
            if let Some((last,typ)) = head.get(skip..).and_then(block::first_block_header) {
                log::debug!("first block is {:?}, final flag {}",typ,last);
            }
        }
        eprintln!("compressed {} into {}",in_size,out_size);
    }

    Ok(())
}
