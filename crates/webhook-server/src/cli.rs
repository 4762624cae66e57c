use clap::builder::PossibleValue;
use clap::{Arg, ArgAction, Command, crate_authors, crate_description, crate_name, crate_version};

pub fn build_cli() -> Command {
    let mut args = vec![
        Arg::new("log-level")
            .long("log-level")
            .value_name("LOG_LEVEL")
            .env("WEBHOOK_LOG_LEVEL")
            .default_value("info")
            .value_parser([
                PossibleValue::new("trace"),
                PossibleValue::new("debug"),
                PossibleValue::new("info"),
                PossibleValue::new("warn"),
                PossibleValue::new("error"),
            ])
            .help("Log level"),
        Arg::new("log-fmt")
            .long("log-fmt")
            .value_name("LOG_FMT")
            .env("WEBHOOK_LOG_FMT")
            .default_value("text")
            .value_parser([
                PossibleValue::new("text"),
                PossibleValue::new("json"),
                PossibleValue::new("otlp"),
            ])
            .help("Log output format"),
        Arg::new("log-no-color")
            .long("log-no-color")
            .env("NO_COLOR")
            .action(ArgAction::SetTrue)
            .help("Disable colored output for logs"),
        Arg::new("address")
            .long("addr")
            .value_name("BIND_ADDRESS")
            .default_value("0.0.0.0")
            .env("WEBHOOK_BIND_ADDRESS")
            .help("Bind against ADDRESS"),
        Arg::new("port")
            .long("port")
            .value_name("PORT")
            .default_value("9443")
            .env("WEBHOOK_PORT")
            .help("Listen on PORT"),
        Arg::new("cert-file")
            .long("cert-file")
            .value_name("CERT_FILE")
            .default_value("")
            .env("WEBHOOK_CERT_FILE")
            .help("Path to an X.509 certificate file for HTTPS"),
        Arg::new("key-file")
            .long("key-file")
            .value_name("KEY_FILE")
            .default_value("")
            .env("WEBHOOK_KEY_FILE")
            .help("Path to an X.509 private key file for HTTPS"),
        Arg::new("client-ca-file")
            .long("client-ca-file")
            .value_name("CLIENT_CA_FILE")
            .env("WEBHOOK_CLIENT_CA_FILE")
            .value_delimiter(',')
            .action(ArgAction::Append)
            .help("Path to a CA certificate file that issued the client certificates. Enables mTLS"),
        Arg::new("webhooks")
            .long("webhooks")
            .value_name("WEBHOOKS")
            .env("WEBHOOK_ENABLED_WEBHOOKS")
            .value_delimiter(',')
            .action(ArgAction::Append)
            .default_values(["pod", "cronjob"])
            .value_parser([PossibleValue::new("pod"), PossibleValue::new("cronjob")])
            .help("Comma separated list of the webhooks to serve"),
        Arg::new("enable-metrics")
            .long("enable-metrics")
            .env("WEBHOOK_ENABLE_METRICS")
            .action(ArgAction::SetTrue)
            .help("Enable metrics"),
    ];
    args.sort_by(|a, b| a.get_id().cmp(b.get_id()));

    Command::new(crate_name!())
        .author(crate_authors!())
        .version(crate_version!())
        .about(crate_description!())
        .args(args)
}
