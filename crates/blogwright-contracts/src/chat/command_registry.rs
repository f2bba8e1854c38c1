#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Generation options. The argument lands in `settings_update` under the command name.
pub(crate) const SETTING_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "provider",
        action: "set_provider",
    },
    CommandSpec {
        command: "model",
        action: "set_model",
    },
    CommandSpec {
        command: "audience",
        action: "set_audience",
    },
    CommandSpec {
        command: "tone",
        action: "set_tone",
    },
    CommandSpec {
        command: "sections",
        action: "set_sections",
    },
];

pub(crate) const QUERY_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "search",
    action: "search_images",
}];

pub(crate) const SINGLE_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "drag",
        action: "begin_drag",
    },
    CommandSpec {
        command: "drop",
        action: "drop",
    },
];

pub(crate) const MULTI_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "select",
        action: "toggle_sections",
    },
    CommandSpec {
        command: "save_image",
        action: "save_image",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "select_all",
        action: "select_all_sections",
    },
    CommandSpec {
        command: "images",
        action: "generate_section_images",
    },
    CommandSpec {
        command: "search_sections",
        action: "search_images_for_sections",
    },
    CommandSpec {
        command: "gallery",
        action: "show_gallery",
    },
    CommandSpec {
        command: "zones",
        action: "show_zones",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
];

pub(crate) const EXPORT_COMMAND: CommandSpec = CommandSpec {
    command: "export",
    action: "export",
};

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/provider",
    "/model",
    "/audience",
    "/tone",
    "/sections",
    "/select",
    "/select_all",
    "/images",
    "/search",
    "/search_sections",
    "/gallery",
    "/zones",
    "/drag",
    "/drop",
    "/save_image",
    "/export",
    "/help",
];
