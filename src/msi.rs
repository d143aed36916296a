// src/msi.rs

//! Well-known exit codes returned by the Windows Installer
//!
//! When a command interprets an exit code, its own exit-code map takes
//! precedence; MSI-typed commands fall back to this catalog. The codes
//! and names follow the Windows Installer error-code documentation.

use crate::model::ExitCodeInfo;

/// ERROR_SUCCESS
pub const SUCCESS: i32 = 0;
/// ERROR_UNKNOWN_PRODUCT, returned when uninstalling a product that is
/// not installed.
pub const UNKNOWN_PRODUCT: i32 = 1605;
/// ERROR_INSTALL_ALREADY_RUNNING
pub const INSTALL_ALREADY_RUNNING: i32 = 1618;
/// ERROR_SUCCESS_REBOOT_INITIATED
pub const SUCCESS_REBOOT_INITIATED: i32 = 1641;
/// ERROR_SUCCESS_REBOOT_REQUIRED
pub const SUCCESS_REBOOT_REQUIRED: i32 = 3010;

/// Looks up information about a Windows Installer exit code.
pub fn info(code: i32) -> Option<ExitCodeInfo> {
    let (name, description, ok) = match code {
        0 => ("ERROR_SUCCESS", "The action completed successfully.", true),
        13 => ("ERROR_INVALID_DATA", "The data is invalid.", false),
        87 => ("ERROR_INVALID_PARAMETER", "One of the parameters was invalid.", false),
        120 => (
            "ERROR_CALL_NOT_IMPLEMENTED",
            "This value is returned when a custom action attempts to call a function that cannot be called from custom actions.",
            false,
        ),
        1259 => (
            "ERROR_APPHELP_BLOCK",
            "This error code only occurs when using Windows Installer version 2.0 and Windows XP or later.",
            false,
        ),
        1601 => (
            "ERROR_INSTALL_SERVICE_FAILURE",
            "The Windows Installer service could not be accessed.",
            false,
        ),
        1602 => ("ERROR_INSTALL_USEREXIT", "The user cancels installation.", false),
        1603 => (
            "ERROR_INSTALL_FAILURE",
            "A fatal error occurred during installation.",
            false,
        ),
        1604 => ("ERROR_INSTALL_SUSPEND", "Installation suspended, incomplete.", false),
        1605 => (
            "ERROR_UNKNOWN_PRODUCT",
            "This action is only valid for products that are currently installed.",
            false,
        ),
        1606 => ("ERROR_UNKNOWN_FEATURE", "The feature identifier is not registered.", false),
        1607 => (
            "ERROR_UNKNOWN_COMPONENT",
            "The component identifier is not registered.",
            false,
        ),
        1608 => ("ERROR_UNKNOWN_PROPERTY", "This is an unknown property.", false),
        1609 => ("ERROR_INVALID_HANDLE_STATE", "The handle is in an invalid state.", false),
        1610 => (
            "ERROR_BAD_CONFIGURATION",
            "The configuration data for this product is corrupt. Contact your support personnel.",
            false,
        ),
        1611 => ("ERROR_INDEX_ABSENT", "The component qualifier not present.", false),
        1612 => (
            "ERROR_INSTALL_SOURCE_ABSENT",
            "The installation source for this product is not available.",
            false,
        ),
        1613 => (
            "ERROR_INSTALL_PACKAGE_VERSION",
            "This installation package cannot be installed by the Windows Installer service.",
            false,
        ),
        1614 => ("ERROR_PRODUCT_UNINSTALLED", "The product is uninstalled.", false),
        1615 => (
            "ERROR_BAD_QUERY_SYNTAX",
            "The SQL query syntax is invalid or unsupported.",
            false,
        ),
        1616 => ("ERROR_INVALID_FIELD", "The record field does not exist.", false),
        1618 => (
            "ERROR_INSTALL_ALREADY_RUNNING",
            "Another installation is already in progress.",
            false,
        ),
        1619 => (
            "ERROR_INSTALL_PACKAGE_OPEN_FAILED",
            "This installation package could not be opened.",
            false,
        ),
        1620 => (
            "ERROR_INSTALL_PACKAGE_INVALID",
            "This installation package could not be opened.",
            false,
        ),
        1621 => (
            "ERROR_INSTALL_UI_FAILURE",
            "There was an error starting the Windows Installer service user interface.",
            false,
        ),
        1622 => (
            "ERROR_INSTALL_LOG_FAILURE",
            "There was an error opening installation log file.",
            false,
        ),
        1623 => (
            "ERROR_INSTALL_LANGUAGE_UNSUPPORTED",
            "This language of this installation package is not supported by your system.",
            false,
        ),
        1624 => (
            "ERROR_INSTALL_TRANSFORM_FAILURE",
            "There was an error applying transforms.",
            false,
        ),
        1625 => (
            "ERROR_INSTALL_PACKAGE_REJECTED",
            "This installation is forbidden by system policy.",
            false,
        ),
        1626 => ("ERROR_FUNCTION_NOT_CALLED", "The function could not be executed.", false),
        1627 => ("ERROR_FUNCTION_FAILED", "The function failed during execution.", false),
        1628 => ("ERROR_INVALID_TABLE", "An invalid or unknown table was specified.", false),
        1629 => ("ERROR_DATATYPE_MISMATCH", "The data supplied is the wrong type.", false),
        1630 => ("ERROR_UNSUPPORTED_TYPE", "Data of this type is not supported.", false),
        1631 => (
            "ERROR_CREATE_FAILED",
            "The Windows Installer service failed to start.",
            false,
        ),
        1632 => (
            "ERROR_INSTALL_TEMP_UNWRITABLE",
            "The Temp folder is either full or inaccessible.",
            false,
        ),
        1633 => (
            "ERROR_INSTALL_PLATFORM_UNSUPPORTED",
            "This installation package is not supported on this platform.",
            false,
        ),
        1634 => ("ERROR_INSTALL_NOTUSED", "Component is not used on this machine.", false),
        1635 => (
            "ERROR_PATCH_PACKAGE_OPEN_FAILED",
            "This patch package could not be opened.",
            false,
        ),
        1636 => (
            "ERROR_PATCH_PACKAGE_INVALID",
            "This patch package could not be opened.",
            false,
        ),
        1637 => (
            "ERROR_PATCH_PACKAGE_UNSUPPORTED",
            "This patch package cannot be processed by the Windows Installer service.",
            false,
        ),
        1638 => (
            "ERROR_PRODUCT_VERSION",
            "Another version of this product is already installed.",
            false,
        ),
        1639 => (
            "ERROR_INVALID_COMMAND_LINE",
            "Invalid command line argument.",
            false,
        ),
        1640 => (
            "ERROR_INSTALL_REMOTE_DISALLOWED",
            "The current user is not permitted to perform installations from a client session.",
            false,
        ),
        1641 => (
            "ERROR_SUCCESS_REBOOT_INITIATED",
            "The installer has initiated a restart.",
            true,
        ),
        1642 => (
            "ERROR_PATCH_TARGET_NOT_FOUND",
            "The installer cannot install the upgrade patch because the program being upgraded may be missing.",
            false,
        ),
        1643 => (
            "ERROR_PATCH_PACKAGE_REJECTED",
            "The patch package is not permitted by system policy.",
            false,
        ),
        1644 => (
            "ERROR_INSTALL_TRANSFORM_REJECTED",
            "One or more customizations are not permitted by system policy.",
            false,
        ),
        1645 => (
            "ERROR_INSTALL_REMOTE_PROHIBITED",
            "Windows Installer does not permit installation from a Remote Desktop Connection.",
            false,
        ),
        1646 => (
            "ERROR_PATCH_REMOVAL_UNSUPPORTED",
            "The patch package is not a removable patch package.",
            false,
        ),
        1647 => (
            "ERROR_UNKNOWN_PATCH",
            "The patch is not applied to this product.",
            false,
        ),
        1648 => (
            "ERROR_PATCH_NO_SEQUENCE",
            "No valid sequence could be found for the set of patches.",
            false,
        ),
        1649 => (
            "ERROR_PATCH_REMOVAL_DISALLOWED",
            "Patch removal was disallowed by policy.",
            false,
        ),
        1650 => (
            "ERROR_INVALID_PATCH_XML",
            "The XML patch data is invalid.",
            false,
        ),
        1651 => (
            "ERROR_PATCH_MANAGED_ADVERTISED_PRODUCT",
            "Administrative user failed to apply patch for a per-user managed or a per-machine application that is in advertise state.",
            false,
        ),
        1652 => (
            "ERROR_INSTALL_SERVICE_SAFEBOOT",
            "Windows Installer is not accessible when the computer is in Safe Mode.",
            false,
        ),
        1653 => (
            "ERROR_ROLLBACK_DISABLED",
            "Could not perform a multiple-package transaction because rollback has been disabled.",
            false,
        ),
        1654 => (
            "ERROR_INSTALL_REJECTED",
            "The app that you are trying to run is not supported on this version of Windows.",
            false,
        ),
        3010 => (
            "ERROR_SUCCESS_REBOOT_REQUIRED",
            "A restart is required to complete the install.",
            true,
        ),
        _ => return None,
    };

    Some(ExitCodeInfo {
        name: name.to_string(),
        description: description.to_string(),
        ok,
    })
}
