use std::env;

pub struct Opts {
    pub subcommand: String,
    pub arg: String,
}

const USAGE: &str = "Usage: warpdrive <run|validate> <step.yaml>\n       warpdrive split <manifests.yaml>\n       warpdrive image <reference>";

pub fn get_opts() -> Opts {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }
    Opts {
        subcommand: args[1].clone(),
        arg: args[2].clone(),
    }
}
