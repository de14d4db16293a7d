use owo_colors::OwoColorize;
use winstrument_types::ProbeDescriptor;

pub fn print_probe_list(descriptors: &[ProbeDescriptor], color: bool) {
    let width = descriptors
        .iter()
        .map(|d| d.name.len())
        .max()
        .unwrap_or(0);

    let heading = "Available probes:";
    if color {
        println!("{}", heading.bold());
    } else {
        println!("{}", heading);
    }

    for descriptor in descriptors.iter().filter(|d| d.available) {
        println!("  {:<width$}  {}", descriptor.name, descriptor.description, width = width);
    }

    let missing: Vec<&ProbeDescriptor> = descriptors.iter().filter(|d| !d.available).collect();
    if missing.is_empty() {
        return;
    }

    println!();
    let heading = "Described but not implemented:";
    if color {
        println!("{}", heading.yellow());
    } else {
        println!("{}", heading);
    }
    for descriptor in missing {
        println!("  {}", descriptor.name);
    }
}

pub fn print_probe_info(descriptors: &[ProbeDescriptor], color: bool) {
    for descriptor in descriptors {
        if color {
            println!("{}", descriptor.name.bold());
        } else {
            println!("{}", descriptor.name);
        }
        println!("{}", descriptor.description);
        println!();
    }
}
