use color_print::ceprintln;

pub fn info(message: &str) {
    ceprintln!("<green, bold>info:</green, bold> {}", message);
}

pub fn warn(message: &str) {
    ceprintln!("<yellow, bold>warn:</yellow, bold> {}", message);
}

pub fn error(message: &str) {
    ceprintln!("<red, bold>error:</red, bold> {}", message);
}
