use clap::Parser;

use regex_flavors::flavor::ruby;
use regex_flavors::{parse_with, validate, Encoding, Flavor, ParserOptions, RegexError};

/// Translate a regular expression into the canonical syntax tree
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The dialect the pattern is written in
    #[arg(short, long, default_value = "ecmascript")]
    flavor: Flavor,

    /// Flags, as the dialect spells them
    #[arg(long, default_value = "")]
    flags: String,

    /// Encoding of the strings the pattern will run against
    #[arg(short, long, default_value = "utf16")]
    encoding: Encoding,

    /// Only check the pattern for syntax errors
    #[arg(long)]
    validate: bool,

    /// Print the Ruby pattern rewritten in the canonical dialect
    #[arg(long)]
    translate: bool,

    /// Locale for Python's LOCALE flag
    #[arg(long)]
    locale: Option<String>,

    /// Treat atomic groups and possessive quantifiers as plain ones
    #[arg(long)]
    ignore_atomic_groups: bool,

    /// The expression to translate
    pattern: String,
}

fn run(args: &Args) -> Result<(), RegexError> {
    let options = ParserOptions {
        encoding: args.encoding,
        ignore_atomic_groups: args.ignore_atomic_groups,
        locale: args.locale.clone(),
        ..ParserOptions::default()
    };

    if args.validate {
        validate(&args.pattern, &args.flags, args.flavor)?;
        println!("ok");
        return Ok(());
    }

    if args.translate {
        if args.flavor != Flavor::Ruby {
            return Err(RegexError::unsupported(format!(
                "--translate for {} patterns",
                args.flavor
            )));
        }
        let translated = ruby::translate(&args.pattern, &args.flags, &options)?;
        println!("/{}/{}", translated.pattern, translated.flags);
        if !translated.named_groups.is_empty() {
            println!("names: {}", translated.named_groups);
        }
        return Ok(());
    }

    let parsed = parse_with(&args.pattern, &args.flags, args.flavor, &options)?;
    println!("{}", parsed.ast);
    if !parsed.named_groups.is_empty() {
        println!("names: {}", parsed.named_groups);
    }
    println!("groups: {}", parsed.ast.group_count());
    println!("traits: {:?}", parsed.traits);
    Ok(())
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    log::debug!("{:?}", args);

    if let Err(e) = run(&args) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
