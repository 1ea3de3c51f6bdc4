use std::{
    env,
    io::{self, BufRead as _, Write as _},
    path::Path,
    process::ExitCode,
};

use keel::{ReplFlow, ShellSession, StdIo};

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code.rem_euclid(256)).unwrap_or(1))
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let mut session = ShellSession::new();
    let mut shell_io = StdIo;
    session.run_startup(&mut shell_io);

    if args.len() > 1 {
        return match session.run_script(Path::new(&args[1]), &mut shell_io) {
            Ok(ReplFlow::Exit(code)) => exit_code(code),
            Ok(ReplFlow::Continue) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("keel: error opening script '{}': {err}", args[1]);
                ExitCode::FAILURE
            }
        };
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{}", session.prompt());
        let _ = io::stdout().flush();
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {}
            Err(err) => {
                eprintln!("keel: read error: {err}");
                break;
            }
        }
        if let ReplFlow::Exit(code) = session.execute(&line, &mut shell_io) {
            return exit_code(code);
        }
    }
    ExitCode::SUCCESS
}
